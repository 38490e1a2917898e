//! 按电机表生成使能帧与控制帧
//!
//! 帧经由 `MotorDriver` 发往内存中的模拟总线，再逐帧打印，
//! 与真实总线上的发送顺序一致。

use crate::utils::format_frame;
use anyhow::{Context, Result};
use clap::Args;
use dm_can::MockCanAdapter;
use dm_driver::{MotorDriver, RegistryConfig};
use std::path::PathBuf;
use tracing::info;

/// 帧预览参数
#[derive(Args, Debug)]
pub struct FramesCommand {
    /// 电机表（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 不输出使能帧
    #[arg(long)]
    pub no_enable: bool,

    /// 控制周期数
    #[arg(long, default_value_t = 1)]
    pub cycles: u32,
}

impl FramesCommand {
    pub fn render(&self) -> Result<Vec<String>> {
        let config = RegistryConfig::load(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        let mock = MockCanAdapter::new();
        let mut driver = MotorDriver::from_config(&config, mock.clone())?;
        info!("Loaded {} motors", driver.registry().len());

        if !self.no_enable {
            for slot in 0..driver.registry().len() {
                driver.enable(slot)?;
            }
        }
        for _ in 0..self.cycles {
            driver.send_control_all()?;
        }

        Ok(mock.take_sent_frames().iter().map(format_frame).collect())
    }

    pub fn execute(&self) -> Result<()> {
        for line in self.render()? {
            println!("{}", line);
        }
        Ok(())
    }
}
