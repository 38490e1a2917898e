//! 控制帧结构体定义
//!
//! 包含四种控制模式的控制帧，以及使能/失能/清错/保存零点等模式指令帧，
//! 提供转换为 `DmFrame` 的方法。

use crate::codec::{OverflowPolicy, quantize};
use crate::ids::*;
use crate::{DmFrame, ProtocolError, f32_to_bytes_le};

// ============================================================================
// 控制模式
// ============================================================================

/// 控制模式
///
/// 每个电机同一时刻只有一种模式生效，决定控制帧的 ID 偏移与数据布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ControlMode {
    /// MIT 模式（位置/速度/Kp/Kd/力矩）
    #[default]
    Mit,
    /// 位置速度模式
    Position,
    /// 速度模式
    Speed,
    /// 力位混控模式（位置/速度限幅/电流限幅）
    PositionSpeedCurrent,
}

impl ControlMode {
    /// 控制帧 ID 偏移
    pub fn offset(self) -> u16 {
        match self {
            ControlMode::Mit => MIT_MODE_OFFSET,
            ControlMode::Position => POS_MODE_OFFSET,
            ControlMode::Speed => SPD_MODE_OFFSET,
            ControlMode::PositionSpeedCurrent => PSI_MODE_OFFSET,
        }
    }

    /// 该模式下的控制帧 ID
    pub fn can_id(self, motor_id: u16) -> u16 {
        motor_id.wrapping_add(self.offset())
    }

    /// 写入 CTRL_MODE 寄存器时使用的值
    pub fn register_value(self) -> u32 {
        match self {
            ControlMode::Mit => 1,
            ControlMode::Position => 2,
            ControlMode::Speed => 3,
            ControlMode::PositionSpeedCurrent => 4,
        }
    }
}

impl TryFrom<u32> for ControlMode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ControlMode::Mit),
            2 => Ok(ControlMode::Position),
            3 => Ok(ControlMode::Speed),
            4 => Ok(ControlMode::PositionSpeedCurrent),
            _ => Err(ProtocolError::InvalidValue {
                field: "ControlMode",
                value,
            }),
        }
    }
}

// ============================================================================
// 量化范围
// ============================================================================

/// 电机的对称量化范围
///
/// 位置/速度/力矩分别映射到 `[-max, max]`。MIT 控制帧和反馈帧都依赖它，
/// 必须与电机内部 PMAX/VMAX/TMAX 寄存器一致，否则解码出的物理量没有意义。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorLimits {
    pub p_max: f32,
    pub v_max: f32,
    pub t_max: f32,
}

impl MotorLimits {
    /// DM4310 出厂默认值
    pub const DM4310: MotorLimits = MotorLimits {
        p_max: 12.5,
        v_max: 30.0,
        t_max: 10.0,
    };

    /// 创建量化范围，三个上限都必须是正的有限值
    pub fn new(p_max: f32, v_max: f32, t_max: f32) -> Result<Self, ProtocolError> {
        let limits = Self {
            p_max,
            v_max,
            t_max,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// 校验范围
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for max in [self.p_max, self.v_max, self.t_max] {
            if !max.is_finite() || max <= 0.0 {
                return Err(ProtocolError::InvalidRange { min: -max, max });
            }
        }
        Ok(())
    }
}

// ============================================================================
// MIT 控制指令
// ============================================================================

/// MIT 控制指令（ID = 电机 ID + 0x000）
///
/// 位域布局（高位在前）：
/// - Byte 0-1: pos (16位)
/// - Byte 2: vel [bit11~bit4]
/// - Byte 3: vel [bit3~bit0] | kp [bit11~bit8] (跨字节打包)
/// - Byte 4: kp [bit7~bit0]
/// - Byte 5: kd [bit11~bit4]
/// - Byte 6: kd [bit3~bit0] | torque [bit11~bit8] (跨字节打包)
/// - Byte 7: torque [bit7~bit0]
///
/// pos/vel/torque 使用电机自己的 [`MotorLimits`]，kp/kd 使用全局固定范围。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MitControlCommand {
    pub motor_id: u16,
    pub pos: f32,
    pub vel: f32,
    pub kp: f32,
    pub kd: f32,
    pub torque: f32,
}

impl MitControlCommand {
    pub fn new(motor_id: u16, pos: f32, vel: f32, kp: f32, kd: f32, torque: f32) -> Self {
        Self {
            motor_id,
            pos,
            vel,
            kp,
            kd,
            torque,
        }
    }

    /// 转换为 CAN 帧
    pub fn to_frame(
        &self,
        limits: &MotorLimits,
        policy: OverflowPolicy,
    ) -> Result<DmFrame, ProtocolError> {
        let pos = quantize("pos", self.pos, -limits.p_max, limits.p_max, 16, policy)?;
        let vel = quantize("vel", self.vel, -limits.v_max, limits.v_max, 12, policy)?;
        let kp = quantize("kp", self.kp, KP_MIN, KP_MAX, 12, policy)?;
        let kd = quantize("kd", self.kd, KD_MIN, KD_MAX, 12, policy)?;
        let torque = quantize("torque", self.torque, -limits.t_max, limits.t_max, 12, policy)?;

        let data = [
            (pos >> 8) as u8,
            pos as u8,
            (vel >> 4) as u8,
            (((vel & 0x0F) << 4) | ((kp >> 8) & 0x0F)) as u8,
            kp as u8,
            (kd >> 4) as u8,
            (((kd & 0x0F) << 4) | ((torque >> 8) & 0x0F)) as u8,
            torque as u8,
        ];

        Ok(DmFrame::new_standard(
            ControlMode::Mit.can_id(self.motor_id),
            &data,
        ))
    }
}

// ============================================================================
// 位置速度 / 速度控制指令
// ============================================================================

/// 位置速度控制指令（ID = 电机 ID + 0x100）
///
/// - Byte 0-3: pos (f32，小端)
/// - Byte 4-7: vel (f32，小端)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionControlCommand {
    pub motor_id: u16,
    pub pos: f32,
    pub vel: f32,
}

impl PositionControlCommand {
    pub fn new(motor_id: u16, pos: f32, vel: f32) -> Self {
        Self { motor_id, pos, vel }
    }

    pub fn to_frame(&self) -> DmFrame {
        let mut data = [0u8; 8];
        data[0..4].copy_from_slice(&f32_to_bytes_le(self.pos));
        data[4..8].copy_from_slice(&f32_to_bytes_le(self.vel));
        DmFrame::new_standard(ControlMode::Position.can_id(self.motor_id), &data)
    }
}

/// 速度控制指令（ID = 电机 ID + 0x200）
///
/// 只有 4 字节：vel (f32，小端)。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedControlCommand {
    pub motor_id: u16,
    pub vel: f32,
}

impl SpeedControlCommand {
    pub fn new(motor_id: u16, vel: f32) -> Self {
        Self { motor_id, vel }
    }

    pub fn to_frame(&self) -> DmFrame {
        DmFrame::new_standard(
            ControlMode::Speed.can_id(self.motor_id),
            &f32_to_bytes_le(self.vel),
        )
    }
}

// ============================================================================
// 力位混控指令
// ============================================================================

/// 力位混控速度缩放（rad/s → 0.01 rad/s）
pub const PSI_VELOCITY_SCALE: f32 = 100.0;

/// 力位混控电流缩放（标幺值 → 1/10000）
pub const PSI_CURRENT_SCALE: f32 = 10000.0;

/// 力位混控指令（ID = 电机 ID + 0x300）
///
/// - Byte 0-3: pos (f32，小端)
/// - Byte 4-5: vel × 100 截断为 u16（小端）
/// - Byte 6-7: current × 10000 截断为 u16（小端）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsiControlCommand {
    pub motor_id: u16,
    pub pos: f32,
    pub vel: f32,
    pub current: f32,
}

impl PsiControlCommand {
    pub fn new(motor_id: u16, pos: f32, vel: f32, current: f32) -> Self {
        Self {
            motor_id,
            pos,
            vel,
            current,
        }
    }

    pub fn to_frame(&self, policy: OverflowPolicy) -> Result<DmFrame, ProtocolError> {
        let vel = scale_to_u16("vel", self.vel, PSI_VELOCITY_SCALE, policy)?;
        let current = scale_to_u16("current", self.current, PSI_CURRENT_SCALE, policy)?;

        let mut data = [0u8; 8];
        data[0..4].copy_from_slice(&f32_to_bytes_le(self.pos));
        data[4..6].copy_from_slice(&vel.to_le_bytes());
        data[6..8].copy_from_slice(&current.to_le_bytes());
        Ok(DmFrame::new_standard(
            ControlMode::PositionSpeedCurrent.can_id(self.motor_id),
            &data,
        ))
    }
}

/// 缩放后向零截断为 u16
fn scale_to_u16(
    field: &'static str,
    value: f32,
    scale: f32,
    policy: OverflowPolicy,
) -> Result<u16, ProtocolError> {
    let scaled = value * scale;
    let fits = (0.0..=u16::MAX as f32).contains(&scaled);
    match policy {
        OverflowPolicy::Reject if !fits => Err(ProtocolError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: u16::MAX as f32 / scale,
        }),
        OverflowPolicy::Saturate if scaled.is_nan() => Err(ProtocolError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: u16::MAX as f32 / scale,
        }),
        // `as` 转换向零截断并在两端饱和
        _ => Ok(scaled as u16),
    }
}

// ============================================================================
// 模式指令（使能/失能/保存零点/清错）
// ============================================================================

/// 模式指令
///
/// 数据固定为 7 个 `0xFF` 加 1 个区分字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    /// 使能
    Enable = 0xFC,
    /// 失能
    Disable = 0xFD,
    /// 保存当前位置为零点
    SaveZero = 0xFE,
    /// 清除错误
    ClearError = 0xFB,
}

impl ModeCommand {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ModeCommand {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xFC => Ok(ModeCommand::Enable),
            0xFD => Ok(ModeCommand::Disable),
            0xFE => Ok(ModeCommand::SaveZero),
            0xFB => Ok(ModeCommand::ClearError),
            _ => Err(ProtocolError::InvalidValue {
                field: "ModeCommand",
                value: value as u32,
            }),
        }
    }
}

/// 模式指令帧（ID = 电机 ID + 当前模式偏移）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeCommandFrame {
    pub motor_id: u16,
    pub mode: ControlMode,
    pub command: ModeCommand,
}

impl ModeCommandFrame {
    pub fn new(motor_id: u16, mode: ControlMode, command: ModeCommand) -> Self {
        Self {
            motor_id,
            mode,
            command,
        }
    }

    pub fn enable(motor_id: u16, mode: ControlMode) -> Self {
        Self::new(motor_id, mode, ModeCommand::Enable)
    }

    pub fn disable(motor_id: u16, mode: ControlMode) -> Self {
        Self::new(motor_id, mode, ModeCommand::Disable)
    }

    pub fn save_zero(motor_id: u16, mode: ControlMode) -> Self {
        Self::new(motor_id, mode, ModeCommand::SaveZero)
    }

    pub fn clear_error(motor_id: u16, mode: ControlMode) -> Self {
        Self::new(motor_id, mode, ModeCommand::ClearError)
    }

    pub fn to_frame(self) -> DmFrame {
        let mut data = [0xFFu8; 8];
        data[7] = self.command.code();
        DmFrame::new_standard(self.mode.can_id(self.motor_id), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes_to_f32_le;

    const LIMITS: MotorLimits = MotorLimits::DM4310;

    #[test]
    fn test_control_mode_offsets() {
        assert_eq!(ControlMode::Mit.can_id(0x01), 0x001);
        assert_eq!(ControlMode::Position.can_id(0x01), 0x101);
        assert_eq!(ControlMode::Speed.can_id(0x01), 0x201);
        assert_eq!(ControlMode::PositionSpeedCurrent.can_id(0x01), 0x301);
    }

    #[test]
    fn test_control_mode_register_value() {
        for mode in [
            ControlMode::Mit,
            ControlMode::Position,
            ControlMode::Speed,
            ControlMode::PositionSpeedCurrent,
        ] {
            assert_eq!(ControlMode::try_from(mode.register_value()).unwrap(), mode);
        }
        assert!(ControlMode::try_from(0).is_err());
        assert!(ControlMode::try_from(5).is_err());
    }

    #[test]
    fn test_motor_limits_validation() {
        assert!(MotorLimits::new(12.5, 30.0, 10.0).is_ok());
        assert!(MotorLimits::new(0.0, 30.0, 10.0).is_err());
        assert!(MotorLimits::new(12.5, -1.0, 10.0).is_err());
        assert!(MotorLimits::new(12.5, 30.0, f32::NAN).is_err());
    }

    #[test]
    fn test_mit_zero_setpoint_midpoint_pattern() {
        let cmd = MitControlCommand::new(0x01, 0.0, 0.0, 0.0, 0.0, 0.0);
        let frame = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();

        assert_eq!(frame.id, 0x001);
        assert_eq!(frame.len, 8);
        // pos=0x7FFF, vel=0x7FF, kp=0, kd=0, torque=0x7FF
        assert_eq!(
            frame.data,
            [0x7F, 0xFF, 0x7F, 0xF0, 0x00, 0x00, 0x07, 0xFF]
        );
    }

    #[test]
    fn test_mit_full_scale_pattern() {
        let cmd = MitControlCommand::new(0x02, 12.5, 30.0, 500.0, 5.0, 10.0);
        let frame = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();
        assert_eq!(frame.id, 0x002);
        assert_eq!(frame.data, [0xFF; 8]);

        let cmd = MitControlCommand::new(0x02, -12.5, -30.0, 0.0, 0.0, -10.0);
        let frame = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();
        assert_eq!(frame.data, [0x00; 8]);
    }

    #[test]
    fn test_mit_nibble_splicing() {
        // kp = 500 -> 0xFFF，只有 kp 的高 4 位落在 Byte 3 低半字节
        let cmd = MitControlCommand::new(0x01, -12.5, -30.0, 500.0, 0.0, -10.0);
        let frame = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();
        assert_eq!(frame.data, [0x00, 0x00, 0x00, 0x0F, 0xFF, 0x00, 0x00, 0x00]);

        // kd = 5 -> 0xFFF，kd 的低 4 位落在 Byte 6 高半字节
        let cmd = MitControlCommand::new(0x01, -12.5, -30.0, 0.0, 5.0, -10.0);
        let frame = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();
        assert_eq!(frame.data, [0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xF0, 0x00]);
    }

    #[test]
    fn test_mit_rejects_out_of_range() {
        let cmd = MitControlCommand::new(0x01, 20.0, 0.0, 0.0, 0.0, 0.0);
        let err = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "pos", .. }));
    }

    #[test]
    fn test_mit_saturates_out_of_range() {
        let cmd = MitControlCommand::new(0x01, 20.0, 0.0, 600.0, 0.0, 0.0);
        let frame = cmd.to_frame(&LIMITS, OverflowPolicy::Saturate).unwrap();
        assert_eq!(frame.data[0], 0xFF);
        assert_eq!(frame.data[1], 0xFF);
        assert_eq!(frame.data[3] & 0x0F, 0x0F);
        assert_eq!(frame.data[4], 0xFF);
    }

    #[test]
    fn test_mit_deterministic() {
        let cmd = MitControlCommand::new(0x03, 1.0, -2.0, 10.0, 0.8, 0.5);
        let a = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();
        let b = cmd.to_frame(&LIMITS, OverflowPolicy::Reject).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_position_control_frame() {
        let frame = PositionControlCommand::new(0x01, 6.28, 1.5).to_frame();
        assert_eq!(frame.id, 0x101);
        assert_eq!(frame.len, 8);
        assert_eq!(bytes_to_f32_le(frame.data[0..4].try_into().unwrap()), 6.28);
        assert_eq!(bytes_to_f32_le(frame.data[4..8].try_into().unwrap()), 1.5);
    }

    #[test]
    fn test_speed_control_frame() {
        let frame = SpeedControlCommand::new(0x01, 1.0).to_frame();
        assert_eq!(frame.id, 0x201);
        assert_eq!(frame.len, 4);
        assert_eq!(frame.data_slice(), &[0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn test_psi_control_frame() {
        let frame = PsiControlCommand::new(0x01, 1.0, 2.5, 0.02)
            .to_frame(OverflowPolicy::Reject)
            .unwrap();
        assert_eq!(frame.id, 0x301);
        assert_eq!(frame.len, 8);
        assert_eq!(&frame.data[0..4], &[0x00, 0x00, 0x80, 0x3F]);
        // 2.5 * 100 = 250
        assert_eq!(u16::from_le_bytes([frame.data[4], frame.data[5]]), 250);
        // 0.02 * 10000 = 200（浮点截断可能得到 199）
        let current = u16::from_le_bytes([frame.data[6], frame.data[7]]);
        assert!(current == 200 || current == 199, "current = {}", current);
    }

    #[test]
    fn test_psi_rejects_negative_and_overflow() {
        let err = PsiControlCommand::new(0x01, 0.0, -1.0, 0.0)
            .to_frame(OverflowPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "vel", .. }));

        let err = PsiControlCommand::new(0x01, 0.0, 1.0, 7.0)
            .to_frame(OverflowPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { field: "current", .. }));
    }

    #[test]
    fn test_psi_saturates() {
        let frame = PsiControlCommand::new(0x01, 0.0, -1.0, 7.0)
            .to_frame(OverflowPolicy::Saturate)
            .unwrap();
        assert_eq!(&frame.data[4..6], &[0x00, 0x00]);
        assert_eq!(&frame.data[6..8], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_mode_command_frames() {
        let cases = [
            (ModeCommand::Enable, 0xFC),
            (ModeCommand::Disable, 0xFD),
            (ModeCommand::SaveZero, 0xFE),
            (ModeCommand::ClearError, 0xFB),
        ];
        for (command, last) in cases {
            let frame = ModeCommandFrame::new(0x01, ControlMode::Speed, command).to_frame();
            assert_eq!(frame.id, 0x201);
            assert_eq!(frame.len, 8);
            assert_eq!(&frame.data[0..7], &[0xFF; 7]);
            assert_eq!(frame.data[7], last);
            assert_eq!(ModeCommand::try_from(last).unwrap(), command);
        }
    }

    #[test]
    fn test_mode_command_follows_mode_offset() {
        assert_eq!(ModeCommandFrame::enable(0x05, ControlMode::Mit).to_frame().id, 0x005);
        assert_eq!(
            ModeCommandFrame::disable(0x05, ControlMode::PositionSpeedCurrent)
                .to_frame()
                .id,
            0x305
        );
    }

    #[test]
    fn test_mode_command_invalid_code() {
        assert!(ModeCommand::try_from(0x00).is_err());
        assert!(ModeCommand::try_from(0xFF).is_err());
    }
}
