//! 参数解析与输出格式化

use anyhow::{Result, bail};
use dm_protocol::{DmFrame, RegisterId};

/// 解析十进制或 `0x` 前缀的十六进制整数
pub fn parse_int(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid integer '{}': {}", s, e))
}

/// 解析电机 ID（11 位）
pub fn parse_motor_id(s: &str) -> Result<u16, String> {
    let id = parse_int(s)?;
    if id > 0x7FF {
        return Err(format!("motor id 0x{:X} exceeds 11 bits", id));
    }
    Ok(id as u16)
}

/// 按名称（如 `PMAX`）或地址（如 `21`、`0x15`）解析寄存器
pub fn parse_register(s: &str) -> Result<RegisterId, String> {
    if let Some(rid) = RegisterId::from_name(s) {
        return Ok(rid);
    }
    let rid = parse_int(s).map_err(|_| format!("unknown register '{}'", s))?;
    let rid = u8::try_from(rid).map_err(|_| format!("register id {} out of range", rid))?;
    RegisterId::from_rid(rid).map_err(|e| e.to_string())
}

/// 解析十六进制帧数据，允许空格、冒号、短横线分隔
pub fn parse_frame_hex(s: &str) -> Result<Vec<u8>> {
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    let bytes = hex::decode(&compact)?;
    if bytes.is_empty() || bytes.len() > 8 {
        bail!("frame data must be 1-8 bytes, got {}", bytes.len());
    }
    Ok(bytes)
}

/// `0x001  [8]  7F FF 7F F0 00 00 07 FF`
pub fn format_frame(frame: &DmFrame) -> String {
    let data: Vec<String> = frame.data_slice().iter().map(|b| format!("{:02X}", b)).collect();
    format!("0x{:03X}  [{}]  {}", frame.id, frame.len, data.join(" "))
}
