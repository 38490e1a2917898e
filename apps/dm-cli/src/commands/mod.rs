//! 命令定义和实现

pub mod decode;
pub mod frames;
pub mod register;

pub use decode::DecodeCommand;
pub use frames::FramesCommand;
pub use register::{ReadCommand, RefreshCommand, RegistersCommand, SaveCommand, WriteCommand};
