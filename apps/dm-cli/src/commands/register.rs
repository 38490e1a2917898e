//! 寄存器管理帧
//!
//! 只生成帧并打印，方便粘贴到 candump/cansend 或上位机调试工具中。

use crate::utils::{format_frame, parse_int, parse_motor_id, parse_register};
use anyhow::{Context, Result};
use clap::Args;
use dm_protocol::*;

/// 读寄存器
#[derive(Args, Debug)]
pub struct ReadCommand {
    /// 电机 ID
    #[arg(long, value_parser = parse_motor_id)]
    pub id: u16,

    /// 寄存器名或地址
    #[arg(long, value_parser = parse_register)]
    pub rid: RegisterId,
}

impl ReadCommand {
    pub fn render(&self) -> String {
        format_frame(&ReadRegisterCommand::new(self.id, self.rid).to_frame())
    }
}

/// 写寄存器
#[derive(Args, Debug)]
pub struct WriteCommand {
    /// 电机 ID
    #[arg(long, value_parser = parse_motor_id)]
    pub id: u16,

    /// 寄存器名或地址
    #[arg(long, value_parser = parse_register)]
    pub rid: RegisterId,

    /// 写入值（按寄存器类型解析为浮点数或整数）
    #[arg(long, allow_hyphen_values = true)]
    pub value: String,
}

impl WriteCommand {
    pub fn parse_value(&self) -> Result<RegisterValue> {
        let value = match self.rid.kind() {
            RegisterKind::Float => RegisterValue::Float(
                self.value
                    .trim()
                    .parse()
                    .with_context(|| format!("{} expects a float", self.rid.name()))?,
            ),
            RegisterKind::UInt => RegisterValue::UInt(
                parse_int(&self.value).map_err(anyhow::Error::msg)?,
            ),
        };
        Ok(value)
    }

    pub fn render(&self) -> Result<String> {
        let value = self.parse_value()?;
        let frame = WriteRegisterCommand::new(self.id, self.rid, value)?.to_frame();
        Ok(format_frame(&frame))
    }
}

/// 保存参数到 Flash
#[derive(Args, Debug)]
pub struct SaveCommand {
    /// 电机 ID
    #[arg(long, value_parser = parse_motor_id)]
    pub id: u16,
}

impl SaveCommand {
    pub fn render(&self) -> String {
        format_frame(&SaveRegistersCommand::new(self.id).to_frame())
    }
}

/// 请求一帧反馈
#[derive(Args, Debug)]
pub struct RefreshCommand {
    /// 电机 ID
    #[arg(long, value_parser = parse_motor_id)]
    pub id: u16,
}

impl RefreshCommand {
    pub fn render(&self) -> String {
        format_frame(&RefreshFeedbackCommand::new(self.id).to_frame())
    }
}

/// 列出寄存器表
#[derive(Debug)]
pub struct RegistersCommand;

impl RegistersCommand {
    pub fn render(&self) -> Vec<String> {
        REGISTER_SCAN_ORDER
            .iter()
            .enumerate()
            .map(|(i, rid)| {
                let kind = match rid.kind() {
                    RegisterKind::Float => "f32",
                    RegisterKind::UInt => "u32",
                };
                let access = match rid.access() {
                    RegisterAccess::ReadOnly => "RO",
                    RegisterAccess::ReadWrite => "RW",
                };
                format!(
                    "{:>2}  {:<10} 0x{:02X}  {}  {}",
                    i + 1,
                    rid.name(),
                    rid.rid(),
                    kind,
                    access
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_frame() {
        let cmd = ReadCommand {
            id: 0x01,
            rid: RegisterId::Inertia,
        };
        assert_eq!(cmd.render(), "0x7FF  [4]  01 00 33 0C");
    }

    #[test]
    fn test_write_float() {
        let cmd = WriteCommand {
            id: 0x01,
            rid: RegisterId::Pmax,
            value: "1.0".into(),
        };
        assert_eq!(cmd.render().unwrap(), "0x7FF  [8]  01 00 55 15 00 00 80 3F");
    }

    #[test]
    fn test_write_uint_hex() {
        let cmd = WriteCommand {
            id: 0x02,
            rid: RegisterId::MstId,
            value: "0x12".into(),
        };
        assert_eq!(cmd.render().unwrap(), "0x7FF  [8]  02 00 55 07 12 00 00 00");
    }

    #[test]
    fn test_write_rejects_read_only_and_bad_value() {
        let cmd = WriteCommand {
            id: 0x01,
            rid: RegisterId::Sn,
            value: "1".into(),
        };
        assert!(cmd.render().is_err());

        let cmd = WriteCommand {
            id: 0x01,
            rid: RegisterId::Timeout,
            value: "1.5".into(),
        };
        assert!(cmd.render().is_err());
    }

    #[test]
    fn test_save_and_refresh() {
        assert_eq!(SaveCommand { id: 0x03 }.render(), "0x7FF  [4]  03 00 AA 01");
        assert_eq!(RefreshCommand { id: 0x03 }.render(), "0x7FF  [4]  03 00 CC 00");
    }

    #[test]
    fn test_register_table_listing() {
        let lines = RegistersCommand.render();
        assert_eq!(lines.len(), 45);
        assert!(lines[0].contains("UV_Value"));
        assert!(lines[44].contains("0x51"));
        assert!(lines[44].ends_with("RO"));
    }
}
