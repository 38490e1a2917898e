//! # DM Driver
//!
//! 达妙电机的状态管理与传输配对层：
//! - `registry`: 电机注册表，唯一的状态所有者（控制帧分发、入站路由）
//! - `sequencer`: 寄存器扫描状态机与寄存器缓存
//! - `config`: TOML 电机表
//! - `driver`: 注册表 + `CanAdapter` 的同步驱动
//!
//! 本层不创建线程、不加锁。多个执行上下文（如接收中断和周期发送任务）
//! 访问同一个注册表时，由调用方负责互斥。
//!
//! ```rust
//! use dm_driver::{ControlTarget, Motor, MotorRegistry};
//! use dm_protocol::{ControlMode, MotorLimits, OverflowPolicy};
//!
//! let mut registry = MotorRegistry::new(
//!     vec![Motor::new(0x01, 0x11, MotorLimits::DM4310).with_mode(ControlMode::Speed)],
//!     OverflowPolicy::Reject,
//! )?;
//! registry.set_target(0, ControlTarget::speed(1.0))?;
//! let frame = registry.dispatch_control(0)?;
//! assert_eq!(frame.id, 0x201);
//! # Ok::<(), dm_driver::DriverError>(())
//! ```

pub mod config;
pub mod driver;
mod error;
pub mod motor;
pub mod registry;
pub mod sequencer;

pub use config::{MotorConfig, RegistryConfig};
pub use driver::{MotorDriver, POLL_BUDGET};
pub use error::DriverError;
pub use motor::{ControlTarget, Motor};
pub use registry::{DropReason, FrameBuffer, MAX_MOTOR_ID, MotorRegistry, RxEvent};
pub use sequencer::{
    RegisterCache, RegisterSequencer, ScanOutcome, ScanState, Transition, transition,
};
