//! # DM Protocol
//!
//! 达妙（DM 系列）关节电机 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 与模式偏移常量
//! - `codec`: 物理量 ↔ 定点整数量化
//! - `control`: 控制帧与模式指令帧构建
//! - `feedback`: 反馈帧解析
//! - `register`: 寄存器读/写/保存协议与寄存器表
//!
//! ## 字节序
//!
//! MIT 控制帧与反馈帧使用高位在前的位域打包；
//! 位置/速度模式与寄存器协议中的浮点数、32 位整数使用小端字节序。

pub mod codec;
pub mod control;
pub mod feedback;
pub mod ids;
pub mod register;

// 重新导出常用类型
pub use codec::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use register::*;

use thiserror::Error;

/// CAN 2.0 标准帧的统一抽象
///
/// `DmFrame` 是协议层和硬件层之间的中间抽象：
/// 协议层只负责构建和解析 `DmFrame`，不关心底层 CAN/FDCAN 的实现。
///
/// ```text
/// Protocol Layer (dm-protocol)
///     ↓ TryFrom<DmFrame> 解析 / new_standard() 构建
/// DmFrame (此类型)
///     ↓
/// CAN Layer (dm-can)
/// ```
///
/// 固定 8 字节数据区，`Copy`，不做堆分配。
///
/// ```rust
/// use dm_protocol::DmFrame;
///
/// let frame = DmFrame::new_standard(0x201, &[1, 2, 3, 4]);
/// assert_eq!(frame.id(), 0x201);
/// assert_eq!(frame.data_slice(), &[1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 硬件时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl DmFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }
}

/// 协议编解码错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u32 },

    #[error("Unknown register id: 0x{rid:02X}")]
    UnknownRegister { rid: u8 },

    #[error("Unexpected frame tag: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag { expected: u8, actual: u8 },

    #[error("Value {value} of {field} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid quantization range [{min}, {max}]")]
    InvalidRange { min: f32, max: f32 },

    #[error("Invalid bit width {bits}: must be in 1..=32")]
    InvalidBitWidth { bits: u8 },

    #[error("Register {rid:?} is read-only")]
    ReadOnlyRegister { rid: RegisterId },

    #[error("Value kind does not match register {rid:?}")]
    RegisterKindMismatch { rid: RegisterId },
}

/// 小端字节序转 f32
pub fn bytes_to_f32_le(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}

/// f32 转小端字节序
pub fn f32_to_bytes_le(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// 小端字节序转 u32
pub fn bytes_to_u32_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// 拆分 11 位电机 ID 为管理帧使用的 (低 8 位, 高 3 位)
pub fn split_motor_id(id: u16) -> (u8, u8) {
    ((id & 0xFF) as u8, ((id >> 8) & 0x07) as u8)
}

/// 从管理帧的 (低 8 位, 高 3 位) 还原电机 ID
pub fn join_motor_id(low: u8, high: u8) -> u16 {
    (((high & 0x07) as u16) << 8) | low as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_standard_pads_data() {
        let frame = DmFrame::new_standard(0x7FF, &[0x01, 0x00, 0x33, 0x0C]);
        assert_eq!(frame.id, 0x7FF);
        assert_eq!(frame.len, 4);
        assert_eq!(frame.data, [0x01, 0x00, 0x33, 0x0C, 0, 0, 0, 0]);
        assert!(!frame.is_extended);
    }

    #[test]
    fn test_new_truncates_long_payload() {
        let frame = DmFrame::new_standard(0x01, &[0xAA; 12]);
        assert_eq!(frame.len, 8);
        assert_eq!(frame.data_slice(), &[0xAA; 8]);
    }

    #[test]
    fn test_f32_le_bytes() {
        assert_eq!(f32_to_bytes_le(1.0), [0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(bytes_to_f32_le([0x00, 0x00, 0x80, 0x3F]), 1.0);
    }

    #[test]
    fn test_u32_le_bytes() {
        assert_eq!(bytes_to_u32_le([0x78, 0x56, 0x34, 0x12]), 0x12345678);
    }

    #[test]
    fn test_split_motor_id() {
        assert_eq!(split_motor_id(0x01), (0x01, 0x00));
        assert_eq!(split_motor_id(0x3A5), (0xA5, 0x03));
        // 只保留 11 位
        assert_eq!(split_motor_id(0xFFFF), (0xFF, 0x07));
    }

    #[test]
    fn test_join_motor_id() {
        assert_eq!(join_motor_id(0xA5, 0x03), 0x3A5);
        assert_eq!(join_motor_id(0x01, 0x00), 0x01);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_json() {
        let frame = DmFrame::new_standard(0x201, &[0x00, 0x00, 0x80, 0x3F]);
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(serde_json::from_str::<DmFrame>(&json).unwrap(), frame);

        let policy: OverflowPolicy = serde_json::from_str("\"saturate\"").unwrap();
        assert_eq!(policy, OverflowPolicy::Saturate);
        let mode: ControlMode = serde_json::from_str("\"position_speed_current\"").unwrap();
        assert_eq!(mode, ControlMode::PositionSpeedCurrent);
    }
}
