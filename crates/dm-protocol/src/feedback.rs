//! 反馈帧结构体定义
//!
//! 电机在收到控制帧或刷新请求后，以 Master ID 回传 8 字节反馈帧：
//!
//! - Byte 0: 低 4 位为电机 ID，高 4 位为电机状态
//! - Byte 1-2: 位置 (16位)
//! - Byte 3 + Byte 4 高 4 位: 速度 (12位)
//! - Byte 4 低 4 位 + Byte 5: 力矩 (12位)
//! - Byte 6: MOS 温度（℃，无缩放）
//! - Byte 7: 线圈温度（℃，无缩放）

use crate::codec::uint_to_float;
use crate::control::MotorLimits;
use crate::{DmFrame, ProtocolError};
use bilge::prelude::*;

// ============================================================================
// 电机状态
// ============================================================================

/// 电机状态（Byte 0 高 4 位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum MotorState {
    /// 失能
    Disabled = 0x0,
    /// 使能
    Enabled = 0x1,
    /// 过压
    OverVoltage = 0x8,
    /// 欠压
    UnderVoltage = 0x9,
    /// 过电流
    OverCurrent = 0xA,
    /// MOS 过温
    MosOverTemp = 0xB,
    /// 电机线圈过温
    CoilOverTemp = 0xC,
    /// 通讯丢失
    CommLost = 0xD,
    /// 过载
    Overload = 0xE,
    /// 未定义状态码
    #[num_enum(catch_all)]
    Unknown(u8),
}

// num_enum 的 `catch_all` 与 `#[default]` 互斥，只能手写
#[allow(clippy::derivable_impls)]
impl Default for MotorState {
    fn default() -> Self {
        MotorState::Disabled
    }
}

impl MotorState {
    /// 是否为故障状态（需要清错后才能重新使能）
    pub fn is_fault(self) -> bool {
        !matches!(self, MotorState::Disabled | MotorState::Enabled)
    }

    /// 状态码
    pub fn code(self) -> u8 {
        match self {
            MotorState::Disabled => 0x0,
            MotorState::Enabled => 0x1,
            MotorState::OverVoltage => 0x8,
            MotorState::UnderVoltage => 0x9,
            MotorState::OverCurrent => 0xA,
            MotorState::MosOverTemp => 0xB,
            MotorState::CoilOverTemp => 0xC,
            MotorState::CommLost => 0xD,
            MotorState::Overload => 0xE,
            MotorState::Unknown(code) => code,
        }
    }
}

/// 反馈帧 Byte 0 位域
///
/// bilge 默认 LSB first，第一个字段对应低 4 位。
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct FeedbackHeader {
    pub device_id: u4, // Bit 0-3: 电机 ID 低 4 位
    pub state: u4,     // Bit 4-7: 电机状态
}

// ============================================================================
// 原始反馈
// ============================================================================

/// 未经量化解码的反馈帧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawFeedback {
    pub device_id: u8, // Byte 0 [bit3~bit0]
    pub state: u8,     // Byte 0 [bit7~bit4]
    pub p_int: u16,    // Byte 1-2
    pub v_int: u16,    // Byte 3, Byte 4 [bit7~bit4]
    pub t_int: u16,    // Byte 4 [bit3~bit0], Byte 5
    pub t_mos: u8,     // Byte 6
    pub t_coil: u8,    // Byte 7
}

impl TryFrom<DmFrame> for RawFeedback {
    type Error = ProtocolError;

    fn try_from(frame: DmFrame) -> Result<Self, Self::Error> {
        if frame.len < 8 {
            return Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: frame.len as usize,
            });
        }

        let data = &frame.data;
        let header = FeedbackHeader::from(u8::new(data[0]));

        Ok(Self {
            device_id: header.device_id().value(),
            state: header.state().value(),
            p_int: ((data[1] as u16) << 8) | data[2] as u16,
            v_int: ((data[3] as u16) << 4) | (data[4] >> 4) as u16,
            t_int: (((data[4] & 0x0F) as u16) << 8) | data[5] as u16,
            t_mos: data[6],
            t_coil: data[7],
        })
    }
}

impl RawFeedback {
    /// 按电机侧格式重新打包（用于模拟电机和帧回放）
    pub fn to_frame(&self, master_id: u16) -> DmFrame {
        let header = FeedbackHeader::new(
            u4::new(self.device_id & 0x0F),
            u4::new(self.state & 0x0F),
        );
        let data = [
            u8::from(header).value(),
            (self.p_int >> 8) as u8,
            self.p_int as u8,
            (self.v_int >> 4) as u8,
            (((self.v_int & 0x0F) << 4) | ((self.t_int >> 8) & 0x0F)) as u8,
            self.t_int as u8,
            self.t_mos,
            self.t_coil,
        ];
        DmFrame::new_standard(master_id, &data)
    }

    /// 用电机的量化范围解码为物理量
    pub fn decode(&self, limits: &MotorLimits) -> MotorFeedback {
        MotorFeedback {
            device_id: self.device_id,
            state: MotorState::from(self.state),
            p_int: self.p_int,
            v_int: self.v_int,
            t_int: self.t_int,
            pos: uint_to_float(self.p_int as u32, -limits.p_max, limits.p_max, 16),
            vel: uint_to_float(self.v_int as u32, -limits.v_max, limits.v_max, 12),
            torque: uint_to_float(self.t_int as u32, -limits.t_max, limits.t_max, 12),
            t_mos: self.t_mos as f32,
            t_coil: self.t_coil as f32,
        }
    }
}

// ============================================================================
// 解码后的反馈
// ============================================================================

/// 电机反馈（每收到一帧整体覆盖）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorFeedback {
    /// 回传的电机 ID（低 4 位）
    pub device_id: u8,
    pub state: MotorState,
    pub p_int: u16,
    pub v_int: u16,
    pub t_int: u16,
    /// 位置（rad）
    pub pos: f32,
    /// 速度（rad/s）
    pub vel: f32,
    /// 力矩（N·m）
    pub torque: f32,
    /// MOS 温度（℃）
    pub t_mos: f32,
    /// 线圈温度（℃）
    pub t_coil: f32,
}

impl MotorFeedback {
    /// 解析并解码反馈帧
    pub fn parse(frame: &DmFrame, limits: &MotorLimits) -> Result<Self, ProtocolError> {
        Ok(RawFeedback::try_from(*frame)?.decode(limits))
    }
}
