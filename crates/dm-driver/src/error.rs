//! 驱动层错误类型定义

use dm_can::CanError;
use dm_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议编码错误（越界、只读寄存器等）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置文件读取失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 槽位越界
    #[error("Invalid motor slot {slot} (registry has {len} motors)")]
    InvalidSlot { slot: usize, len: usize },

    /// 配置解析失败
    #[error("Config error: {0}")]
    Config(String),

    /// 电机 ID 超出范围
    #[error("Invalid motor id 0x{id:X}")]
    InvalidMotorId { id: u16 },

    /// 电机 ID 重复
    #[error("Duplicate motor id 0x{id:X}")]
    DuplicateMotorId { id: u16 },
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use dm_can::CanError;
    use dm_protocol::ProtocolError;

    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::Can(CanError::Timeout);
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Read timeout"), "Can error message: {}", msg);

        let driver_error = DriverError::Protocol(ProtocolError::InvalidLength {
            expected: 8,
            actual: 4,
        });
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Invalid frame length"), "Protocol error message: {}", msg);

        let msg = format!("{}", DriverError::InvalidSlot { slot: 3, len: 2 });
        assert!(msg.contains("slot 3"), "{}", msg);

        let msg = format!("{}", DriverError::DuplicateMotorId { id: 0x1A });
        assert!(msg.contains("0x1A"), "{}", msg);
    }

    #[test]
    fn test_driver_error_from() {
        let err: DriverError = CanError::BusOff.into();
        assert!(matches!(err, DriverError::Can(CanError::BusOff)));

        let err: DriverError = ProtocolError::UnknownRegister { rid: 99 }.into();
        assert!(matches!(
            err,
            DriverError::Protocol(ProtocolError::UnknownRegister { rid: 99 })
        ));
    }
}
