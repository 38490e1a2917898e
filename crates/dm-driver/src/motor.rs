//! 单个电机的状态记录

use crate::sequencer::{RegisterCache, RegisterSequencer};
use dm_protocol::*;
use serde::{Deserialize, Serialize};

/// 外层控制环请求的设定值
///
/// 只有当前控制模式用到的字段会被发送：
///
/// | 模式 | 字段 |
/// |------|------|
/// | Mit | pos, vel, kp, kd, torque |
/// | Position | pos, vel |
/// | Speed | vel |
/// | PositionSpeedCurrent | pos, vel, current |
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlTarget {
    pub pos: f32,
    pub vel: f32,
    pub kp: f32,
    pub kd: f32,
    pub torque: f32,
    pub current: f32,
}

impl ControlTarget {
    pub fn mit(pos: f32, vel: f32, kp: f32, kd: f32, torque: f32) -> Self {
        Self {
            pos,
            vel,
            kp,
            kd,
            torque,
            ..Default::default()
        }
    }

    pub fn position(pos: f32, vel: f32) -> Self {
        Self {
            pos,
            vel,
            ..Default::default()
        }
    }

    pub fn speed(vel: f32) -> Self {
        Self {
            vel,
            ..Default::default()
        }
    }

    pub fn position_speed_current(pos: f32, vel: f32, current: f32) -> Self {
        Self {
            pos,
            vel,
            current,
            ..Default::default()
        }
    }

    /// 所有字段清零
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// 电机状态记录
///
/// 只能由 [`MotorRegistry`](crate::MotorRegistry) 修改；外部只读。
#[derive(Debug, Clone)]
pub struct Motor {
    id: u16,
    master_id: u16,
    limits: MotorLimits,
    control_mode: ControlMode,
    target: ControlTarget,
    feedback: MotorFeedback,
    feedback_frames: u64,
    registers: RegisterCache,
    sequencer: RegisterSequencer,
}

impl Motor {
    /// 新电机：MIT 模式，设定值和反馈全部为零
    pub fn new(id: u16, master_id: u16, limits: MotorLimits) -> Self {
        Self {
            id,
            master_id,
            limits,
            control_mode: ControlMode::default(),
            target: ControlTarget::default(),
            feedback: MotorFeedback::default(),
            feedback_frames: 0,
            registers: RegisterCache::new(),
            sequencer: RegisterSequencer::new(),
        }
    }

    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.control_mode = mode;
        self
    }

    pub fn with_target(mut self, target: ControlTarget) -> Self {
        self.target = target;
        self
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn master_id(&self) -> u16 {
        self.master_id
    }

    pub fn limits(&self) -> &MotorLimits {
        &self.limits
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn target(&self) -> &ControlTarget {
        &self.target
    }

    /// 最近一帧反馈
    pub fn feedback(&self) -> &MotorFeedback {
        &self.feedback
    }

    /// 已收到的反馈帧数
    pub fn feedback_frames(&self) -> u64 {
        self.feedback_frames
    }

    pub fn registers(&self) -> &RegisterCache {
        &self.registers
    }

    pub fn sequencer(&self) -> &RegisterSequencer {
        &self.sequencer
    }

    /// 寄存器扫描游标（0 = 空闲，1..=45 = 正在读第 n 个）
    pub fn read_cursor(&self) -> usize {
        self.sequencer.cursor()
    }

    /// 管理帧中的电机 ID 字节
    pub(crate) fn id_bytes(&self) -> (u8, u8) {
        split_motor_id(self.id)
    }

    /// 按当前模式编码控制帧
    pub fn encode_control(&self, policy: OverflowPolicy) -> Result<DmFrame, ProtocolError> {
        let t = &self.target;
        match self.control_mode {
            ControlMode::Mit => MitControlCommand::new(self.id, t.pos, t.vel, t.kp, t.kd, t.torque)
                .to_frame(&self.limits, policy),
            ControlMode::Position => {
                Ok(PositionControlCommand::new(self.id, t.pos, t.vel).to_frame())
            },
            ControlMode::Speed => Ok(SpeedControlCommand::new(self.id, t.vel).to_frame()),
            ControlMode::PositionSpeedCurrent => {
                PsiControlCommand::new(self.id, t.pos, t.vel, t.current).to_frame(policy)
            },
        }
    }

    /// 按当前模式编码模式指令
    pub fn encode_mode_command(&self, command: ModeCommand) -> DmFrame {
        ModeCommandFrame::new(self.id, self.control_mode, command).to_frame()
    }

    pub(crate) fn set_target(&mut self, target: ControlTarget) {
        self.target = target;
    }

    pub(crate) fn clear_target(&mut self) {
        self.target.clear();
    }

    pub(crate) fn set_control_mode(&mut self, mode: ControlMode) {
        self.control_mode = mode;
    }

    pub(crate) fn apply_feedback(&mut self, feedback: MotorFeedback) {
        self.feedback = feedback;
        self.feedback_frames = self.feedback_frames.wrapping_add(1);
    }

    pub(crate) fn registers_mut(&mut self) -> &mut RegisterCache {
        &mut self.registers
    }

    pub(crate) fn sequencer_mut(&mut self) -> &mut RegisterSequencer {
        &mut self.sequencer
    }

    pub(crate) fn sequencer_and_cache(&mut self) -> (&mut RegisterSequencer, &mut RegisterCache) {
        (&mut self.sequencer, &mut self.registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor(mode: ControlMode, target: ControlTarget) -> Motor {
        Motor::new(0x01, 0x11, MotorLimits::DM4310)
            .with_mode(mode)
            .with_target(target)
    }

    #[test]
    fn test_new_motor_is_zeroed() {
        let m = Motor::new(0x02, 0x12, MotorLimits::DM4310);
        assert_eq!(m.control_mode(), ControlMode::Mit);
        assert!(m.target().is_zero());
        assert_eq!(m.feedback_frames(), 0);
        assert_eq!(m.read_cursor(), 0);
        assert_eq!(m.id_bytes(), (0x02, 0x00));
    }

    #[test]
    fn test_clear_target() {
        let mut target = ControlTarget::mit(1.0, 2.0, 3.0, 0.5, -1.0);
        target.current = 0.1;
        target.clear();
        assert!(target.is_zero());
    }

    #[test]
    fn test_encode_speed_only_sends_velocity() {
        let m = motor(
            ControlMode::Speed,
            ControlTarget {
                pos: 9.0,
                vel: 1.0,
                kp: 100.0,
                kd: 1.0,
                torque: 2.0,
                current: 0.5,
            },
        );
        let frame = m.encode_control(OverflowPolicy::Reject).unwrap();
        assert_eq!(frame.id, 0x201);
        assert_eq!(frame.len, 4);
        assert_eq!(frame.data_slice(), &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_encode_dispatches_by_mode() {
        let target = ControlTarget::position_speed_current(1.0, 2.0, 0.5);
        let cases = [
            (ControlMode::Mit, 0x001),
            (ControlMode::Position, 0x101),
            (ControlMode::Speed, 0x201),
            (ControlMode::PositionSpeedCurrent, 0x301),
        ];
        for (mode, id) in cases {
            let frame = motor(mode, target).encode_control(OverflowPolicy::Reject).unwrap();
            assert_eq!(frame.id, id, "{:?}", mode);
        }
    }

    #[test]
    fn test_encode_mit_out_of_range_rejected() {
        let m = motor(ControlMode::Mit, ControlTarget::mit(20.0, 0.0, 0.0, 0.0, 0.0));
        assert!(m.encode_control(OverflowPolicy::Reject).is_err());
        assert!(m.encode_control(OverflowPolicy::Saturate).is_ok());
    }

    #[test]
    fn test_mode_command_uses_current_mode() {
        let m = motor(ControlMode::Position, ControlTarget::default());
        let frame = m.encode_mode_command(ModeCommand::Enable);
        assert_eq!(frame.id, 0x101);
        assert_eq!(frame.data[7], 0xFC);
    }

    #[test]
    fn test_target_deserializes_with_defaults() {
        let target: ControlTarget = toml::from_str("vel = 1.5").unwrap();
        assert_eq!(target, ControlTarget::speed(1.5));
    }
}
