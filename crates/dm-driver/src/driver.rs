//! 传输层配对
//!
//! [`MotorDriver`] 把 [`MotorRegistry`] 和一个 [`CanAdapter`] 组合在一起：
//! 每个操作先由注册表生成帧，再同步发送。发送失败原样返回，不做重试。

use crate::config::RegistryConfig;
use crate::error::DriverError;
use crate::motor::{ControlTarget, Motor};
use crate::registry::{MotorRegistry, RxEvent};
use dm_can::{CanAdapter, CanError};
use dm_protocol::{ControlMode, DmFrame, RegisterId, RegisterValue};
use tracing::{debug, error, trace};

/// 单次 `poll` 最多处理的入站帧数
pub const POLL_BUDGET: usize = 64;

/// 电机驱动
pub struct MotorDriver<A: CanAdapter> {
    registry: MotorRegistry,
    adapter: A,
    /// `poll` 中途遇到的错误，由下一次 `poll` 返回
    deferred_error: Option<DriverError>,
}

impl<A: CanAdapter> MotorDriver<A> {
    pub fn new(registry: MotorRegistry, adapter: A) -> Self {
        Self {
            registry,
            adapter,
            deferred_error: None,
        }
    }

    pub fn from_config(config: &RegistryConfig, adapter: A) -> Result<Self, DriverError> {
        Ok(Self::new(MotorRegistry::from_config(config)?, adapter))
    }

    pub fn registry(&self) -> &MotorRegistry {
        &self.registry
    }

    pub fn motor(&self, slot: usize) -> Result<&Motor, DriverError> {
        self.registry.motor(slot)
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// 拆回注册表和适配器
    pub fn into_parts(self) -> (MotorRegistry, A) {
        (self.registry, self.adapter)
    }

    fn send(&mut self, frame: DmFrame) -> Result<(), DriverError> {
        trace!("TX 0x{:03X} {:02X?}", frame.id, frame.data_slice());
        self.adapter.send(frame).map_err(|e| {
            error!("Failed to send frame 0x{:03X}: {}", frame.id, e);
            DriverError::from(e)
        })
    }

    // ========================================================================
    // 控制
    // ========================================================================

    pub fn set_target(&mut self, slot: usize, target: ControlTarget) -> Result<(), DriverError> {
        self.registry.set_target(slot, target)
    }

    /// 发送一个电机的控制帧
    pub fn send_control(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.dispatch_control(slot)?;
        self.send(frame)
    }

    /// 发送所有电机的控制帧（先全部编码成功再发送）
    pub fn send_control_all(&mut self) -> Result<(), DriverError> {
        let frames = self.registry.dispatch_all()?;
        for frame in frames {
            self.send(frame)?;
        }
        Ok(())
    }

    pub fn enable(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.enable(slot)?;
        self.send(frame)
    }

    pub fn disable(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.disable(slot)?;
        self.send(frame)
    }

    pub fn clear_error(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.clear_error(slot)?;
        self.send(frame)
    }

    pub fn save_zero(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.save_zero(slot)?;
        self.send(frame)
    }

    pub fn switch_control_mode(
        &mut self,
        slot: usize,
        mode: ControlMode,
    ) -> Result<(), DriverError> {
        let frame = self.registry.switch_control_mode(slot, mode)?;
        self.send(frame)
    }

    // ========================================================================
    // 寄存器
    // ========================================================================

    pub fn start_register_scan(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.start_register_scan(slot)?;
        self.send(frame)
    }

    /// 重发当前未完成的读请求，没有扫描时返回 `false`
    pub fn resend_register_read(&mut self, slot: usize) -> Result<bool, DriverError> {
        match self.registry.pending_register_read(slot)? {
            Some(frame) => {
                debug!("Resending register read for slot {}", slot);
                self.send(frame)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    pub fn write_register(
        &mut self,
        slot: usize,
        rid: RegisterId,
        value: RegisterValue,
    ) -> Result<(), DriverError> {
        let frame = self.registry.write_register(slot, rid, value)?;
        self.send(frame)
    }

    pub fn save_registers(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.save_registers(slot)?;
        self.send(frame)
    }

    pub fn refresh_feedback(&mut self, slot: usize) -> Result<(), DriverError> {
        let frame = self.registry.refresh_feedback(slot)?;
        self.send(frame)
    }

    // ========================================================================
    // 接收
    // ========================================================================

    /// 取出已到达的入站帧（最多 [`POLL_BUDGET`] 帧）并逐一路由
    ///
    /// 扫描前进时立即发出下一个读请求。接收端的超时视为没有更多帧。
    ///
    /// 已被注册表处理的帧总是以事件返回。处理过至少一帧之后遇到的收发错误
    /// 会结束本轮，并由下一次调用返回；后续读请求发送失败时扫描停在当前游标，
    /// 可用 [`resend_register_read`](Self::resend_register_read) 补发。
    pub fn poll(&mut self) -> Result<Vec<RxEvent>, DriverError> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }

        let mut events = Vec::new();
        while events.len() < POLL_BUDGET {
            let frame = match self.adapter.try_receive() {
                Ok(Some(frame)) => frame,
                Ok(None) | Err(CanError::Timeout) => break,
                Err(e) => {
                    error!("Failed to receive frame: {}", e);
                    if events.is_empty() {
                        return Err(e.into());
                    }
                    self.deferred_error = Some(e.into());
                    break;
                },
            };

            let event = self.registry.on_frame_received(&frame);
            events.push(event);
            if let RxEvent::RegisterAdvanced {
                next_read: Some(next),
                ..
            } = event
                && let Err(e) = self.send(next)
            {
                self.deferred_error = Some(e);
                break;
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_can::MockCanAdapter;
    use dm_protocol::{MotorLimits, OverflowPolicy, RawFeedback};

    fn driver() -> (MotorDriver<MockCanAdapter>, MockCanAdapter) {
        let mock = MockCanAdapter::new();
        let registry = MotorRegistry::new(
            vec![Motor::new(0x01, 0x11, MotorLimits::DM4310)],
            OverflowPolicy::Reject,
        )
        .unwrap();
        (MotorDriver::new(registry, mock.clone()), mock)
    }

    #[test]
    fn test_send_failure_propagates() {
        let (mut driver, mock) = driver();
        mock.fail_next_sends(1);
        assert!(matches!(
            driver.enable(0),
            Err(DriverError::Can(CanError::BufferOverflow))
        ));
        // 不重试
        assert!(mock.sent_frames().is_empty());
        driver.enable(0).unwrap();
        assert_eq!(mock.sent_frames().len(), 1);
    }

    #[test]
    fn test_encode_error_sends_nothing() {
        let (mut driver, mock) = driver();
        driver
            .set_target(0, ControlTarget::mit(0.0, 0.0, 600.0, 0.0, 0.0))
            .unwrap();
        assert!(driver.send_control(0).is_err());
        assert!(mock.sent_frames().is_empty());
    }

    #[test]
    fn test_poll_empty() {
        let (mut driver, _mock) = driver();
        assert!(driver.poll().unwrap().is_empty());
    }

    #[test]
    fn test_receive_error_before_any_frame() {
        let (mut driver, mock) = driver();
        mock.queue_receive_error();
        mock.queue_frame(RawFeedback::default().to_frame(0x11));
        assert!(matches!(driver.poll(), Err(DriverError::Can(CanError::BusOff))));
        assert_eq!(driver.poll().unwrap().len(), 1);
    }

    #[test]
    fn test_resend_without_scan() {
        let (mut driver, mock) = driver();
        assert!(!driver.resend_register_read(0).unwrap());
        assert!(mock.sent_frames().is_empty());
    }
}
