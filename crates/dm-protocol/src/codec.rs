//! 物理量量化编解码
//!
//! 把有界物理量（位置、速度、力矩、增益）线性映射为 N 位无符号整数：
//!
//! - 编码：`(x - x_min) * ((1 << bits) - 1) / (x_max - x_min)`，向零截断
//! - 解码：`x_int * (x_max - x_min) / ((1 << bits) - 1) + x_min`
//!
//! 区间外的输入不会被静默截断成带外整数，而是按 [`OverflowPolicy`]
//! 拒绝或饱和到区间边界，调用方必须二选一。

use crate::ProtocolError;

/// 越界输入的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverflowPolicy {
    /// 返回 `ProtocolError::OutOfRange`，不生成帧
    #[default]
    Reject,
    /// 钳位到 `[min, max]` 后再量化
    Saturate,
}

/// N 位无符号整数的最大值，`bits` 须在 `1..=32`
#[inline]
pub fn max_uint(bits: u8) -> Result<u32, ProtocolError> {
    if !(1..=32).contains(&bits) {
        return Err(ProtocolError::InvalidBitWidth { bits });
    }
    Ok(((1u64 << bits) - 1) as u32)
}

/// 一个量化步长 `(max - min) / (2^bits - 1)`，位宽非法时为 NaN
#[inline]
pub fn quantization_step(x_min: f32, x_max: f32, bits: u8) -> f32 {
    max_uint(bits).map_or(f32::NAN, |max_int| (x_max - x_min) / max_int as f32)
}

/// 按策略量化
///
/// `field` 仅用于错误信息。NaN 在两种策略下都被拒绝。
pub fn quantize(
    field: &'static str,
    x: f32,
    x_min: f32,
    x_max: f32,
    bits: u8,
    policy: OverflowPolicy,
) -> Result<u32, ProtocolError> {
    let max_int = max_uint(bits)?;
    let span = x_max - x_min;
    if !span.is_finite() || span <= 0.0 {
        return Err(ProtocolError::InvalidRange {
            min: x_min,
            max: x_max,
        });
    }

    let out_of_range = ProtocolError::OutOfRange {
        field,
        value: x,
        min: x_min,
        max: x_max,
    };
    let x = match policy {
        OverflowPolicy::Reject if !(x_min..=x_max).contains(&x) => return Err(out_of_range),
        OverflowPolicy::Reject => x,
        OverflowPolicy::Saturate if x.is_nan() => return Err(out_of_range),
        OverflowPolicy::Saturate => x.clamp(x_min, x_max),
    };

    let raw = ((x - x_min) * max_int as f32 / span) as u32;
    // x == x_max 时浮点误差可能越过上界
    Ok(raw.min(max_int))
}

/// 浮点数 → 无符号整数（越界即报错）
pub fn float_to_uint(x: f32, x_min: f32, x_max: f32, bits: u8) -> Result<u32, ProtocolError> {
    quantize("value", x, x_min, x_max, bits, OverflowPolicy::Reject)
}

/// 浮点数 → 无符号整数（越界钳位）
///
/// NaN、区间非法、位宽非法仍然报错。
pub fn float_to_uint_saturating(
    x: f32,
    x_min: f32,
    x_max: f32,
    bits: u8,
) -> Result<u32, ProtocolError> {
    quantize("value", x, x_min, x_max, bits, OverflowPolicy::Saturate)
}

/// 无符号整数 → 浮点数
///
/// 位宽非法时返回 NaN；协议内的解码位宽都是固定的 12/16 位。
pub fn uint_to_float(x_int: u32, x_min: f32, x_max: f32, bits: u8) -> f32 {
    let span = x_max - x_min;
    max_uint(bits).map_or(f32::NAN, |max_int| (x_int as f32) * span / max_int as f32 + x_min)
}
