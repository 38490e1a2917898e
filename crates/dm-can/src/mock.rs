//! 内存中的模拟 CAN 适配器
//!
//! 发送的帧记录在共享队列中，接收从预先排队的帧中取出。
//! `Clone` 共享同一组队列：把一个副本交给驱动，测试保留另一个用于检查。

use crate::{CanAdapter, CanError, DmFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// 接收队列中的一项
#[derive(Debug, Clone, Copy)]
enum Inbound {
    Frame(DmFrame),
    /// 取到时返回 `CanError::BusOff`
    BusOff,
}

#[derive(Debug, Clone, Default)]
pub struct MockCanAdapter {
    receive_queue: Arc<Mutex<VecDeque<Inbound>>>,
    sent_frames: Arc<Mutex<Vec<DmFrame>>>,
    failing_sends: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排队一帧待接收
    pub fn queue_frame(&self, frame: DmFrame) {
        lock(&self.receive_queue).push_back(Inbound::Frame(frame));
    }

    pub fn queue_frames(&self, frames: impl IntoIterator<Item = DmFrame>) {
        lock(&self.receive_queue).extend(frames.into_iter().map(Inbound::Frame));
    }

    /// 排队一次接收错误：轮到它时 `receive` 返回 `CanError::BusOff`
    pub fn queue_receive_error(&self) {
        lock(&self.receive_queue).push_back(Inbound::BusOff);
    }

    /// 尚未被读走的项数（含排队的接收错误）
    pub fn pending_receive(&self) -> usize {
        lock(&self.receive_queue).len()
    }

    /// 已发送帧的快照
    pub fn sent_frames(&self) -> Vec<DmFrame> {
        lock(&self.sent_frames).clone()
    }

    /// 取出并清空已发送帧
    pub fn take_sent_frames(&self) -> Vec<DmFrame> {
        std::mem::take(&mut *lock(&self.sent_frames))
    }

    /// 让接下来的 `count` 次发送返回 `CanError::BufferOverflow`
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            trace!("mock send rejected: 0x{:03X}", frame.id);
            return Err(CanError::BufferOverflow);
        }
        trace!("mock send: 0x{:03X} {:02X?}", frame.id, frame.data_slice());
        lock(&self.sent_frames).push(frame);
        Ok(())
    }

    fn receive(&mut self) -> Result<DmFrame, CanError> {
        match lock(&self.receive_queue).pop_front() {
            Some(Inbound::Frame(frame)) => Ok(frame),
            Some(Inbound::BusOff) => {
                trace!("mock receive: bus off");
                Err(CanError::BusOff)
            },
            None => Err(CanError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_queues() {
        let mock = MockCanAdapter::new();
        let mut adapter = mock.clone();

        adapter.send(DmFrame::new_standard(0x01, &[0xFF; 8])).unwrap();
        mock.queue_frame(DmFrame::new_standard(0x11, &[0x11; 8]));

        assert_eq!(mock.sent_frames().len(), 1);
        assert_eq!(adapter.receive().unwrap().id, 0x11);
        assert!(matches!(adapter.receive(), Err(CanError::Timeout)));
    }

    #[test]
    fn test_fail_next_sends() {
        let mock = MockCanAdapter::new();
        let mut adapter = mock.clone();
        mock.fail_next_sends(2);

        let frame = DmFrame::new_standard(0x01, &[0]);
        assert!(adapter.send(frame).is_err());
        assert!(adapter.send(frame).is_err());
        assert!(adapter.send(frame).is_ok());
        assert_eq!(mock.take_sent_frames().len(), 1);
        assert!(mock.sent_frames().is_empty());
    }

    #[test]
    fn test_pending_receive() {
        let mock = MockCanAdapter::new();
        mock.queue_frames([
            DmFrame::new_standard(0x11, &[0; 8]),
            DmFrame::new_standard(0x12, &[0; 8]),
        ]);
        assert_eq!(mock.pending_receive(), 2);
    }

    #[test]
    fn test_queued_receive_error() {
        let mock = MockCanAdapter::new();
        let mut adapter = mock.clone();
        mock.queue_frame(DmFrame::new_standard(0x11, &[0; 8]));
        mock.queue_receive_error();
        mock.queue_frame(DmFrame::new_standard(0x12, &[0; 8]));

        assert_eq!(adapter.try_receive().unwrap().unwrap().id, 0x11);
        assert!(matches!(adapter.try_receive(), Err(CanError::BusOff)));
        assert_eq!(adapter.try_receive().unwrap().unwrap().id, 0x12);
        assert!(adapter.try_receive().unwrap().is_none());
    }
}
