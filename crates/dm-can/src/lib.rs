//! # DM CAN Adapter Layer
//!
//! CAN 硬件抽象层。协议层只产出/消费 [`DmFrame`]，
//! 具体的 SocketCAN、USB-CAN 或 STM32 FDCAN 驱动通过实现 [`CanAdapter`] 接入。

use std::time::Duration;
use thiserror::Error;

// 重新导出 dm-protocol 中的 DmFrame
pub use dm_protocol::DmFrame;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::MockCanAdapter;

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(String),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

impl CanError {
    /// 是否为瞬时错误（重试可能成功）
    pub fn is_transient(&self) -> bool {
        matches!(self, CanError::Timeout | CanError::BufferOverflow)
    }
}

/// CAN 适配器
///
/// 发送是非阻塞的：是否排队、超时由实现自行决定，失败通过 `CanError` 返回。
pub trait CanAdapter {
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError>;
    fn receive(&mut self) -> Result<DmFrame, CanError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<DmFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<DmFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<A: CanAdapter + ?Sized> CanAdapter for &mut A {
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<DmFrame, CanError> {
        (**self).receive()
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        (**self).set_receive_timeout(timeout)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<DmFrame, CanError> {
        (**self).receive_timeout(timeout)
    }

    fn try_receive(&mut self) -> Result<Option<DmFrame>, CanError> {
        (**self).try_receive()
    }
}
