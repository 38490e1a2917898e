//! # DM CLI
//!
//! 达妙电机 CAN 帧离线工具：不连接硬件，只生成和解码帧。
//!
//! ```bash
//! # 按电机表打印使能帧与控制帧
//! dm-cli frames --config configs/motors.toml
//!
//! # 解码一帧反馈
//! dm-cli decode --hex "11 7F FF 7F F7 FF 28 23"
//!
//! # 寄存器管理帧
//! dm-cli read --id 1 --rid PMAX
//! dm-cli write --id 1 --rid CTRL_MODE --value 2
//! dm-cli save --id 1
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::{
    DecodeCommand, FramesCommand, ReadCommand, RefreshCommand, RegistersCommand, SaveCommand,
    WriteCommand,
};

/// DM CLI - 达妙电机帧工具
#[derive(Parser, Debug)]
#[command(name = "dm-cli")]
#[command(about = "Frame tool for DM-series servo motors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 按电机表生成使能帧与控制帧
    Frames {
        #[command(flatten)]
        args: FramesCommand,
    },

    /// 解码反馈帧或寄存器应答
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },

    /// 生成读寄存器帧
    Read {
        #[command(flatten)]
        args: ReadCommand,
    },

    /// 生成写寄存器帧
    Write {
        #[command(flatten)]
        args: WriteCommand,
    },

    /// 生成保存参数帧
    Save {
        #[command(flatten)]
        args: SaveCommand,
    },

    /// 生成刷新反馈帧
    Refresh {
        #[command(flatten)]
        args: RefreshCommand,
    },

    /// 列出寄存器表
    Registers,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dm_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Frames { args } => args.execute(),
        Commands::Decode { args } => args.execute(),
        Commands::Read { args } => {
            println!("{}", args.render());
            Ok(())
        },
        Commands::Write { args } => {
            println!("{}", args.render()?);
            Ok(())
        },
        Commands::Save { args } => {
            println!("{}", args.render());
            Ok(())
        },
        Commands::Refresh { args } => {
            println!("{}", args.render());
            Ok(())
        },
        Commands::Registers => {
            for line in RegistersCommand.render() {
                println!("{}", line);
            }
            Ok(())
        },
    }
}
