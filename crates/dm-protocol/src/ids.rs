//! CAN ID 常量定义
//!
//! 每个电机的控制帧 ID = 电机 ID + 模式偏移；
//! 寄存器读写等管理帧统一发往固定的管理 ID。

// ============================================================================
// 控制模式偏移
// ============================================================================

/// MIT 模式偏移
pub const MIT_MODE_OFFSET: u16 = 0x000;

/// 位置速度模式偏移
pub const POS_MODE_OFFSET: u16 = 0x100;

/// 速度模式偏移
pub const SPD_MODE_OFFSET: u16 = 0x200;

/// 力位混控模式偏移
pub const PSI_MODE_OFFSET: u16 = 0x300;

// ============================================================================
// 管理帧
// ============================================================================

/// 寄存器读/写/保存、反馈刷新使用的管理 ID
pub const ID_MANAGEMENT: u16 = 0x7FF;

/// 标准帧 11 位 ID 的最大值
pub const MAX_STANDARD_ID: u16 = 0x7FF;

// ============================================================================
// MIT 增益量化范围（全局固定，不随电机变化）
// ============================================================================

pub const KP_MIN: f32 = 0.0;
pub const KP_MAX: f32 = 500.0;
pub const KD_MIN: f32 = 0.0;
pub const KD_MAX: f32 = 5.0;
