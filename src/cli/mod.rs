//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `fit`: 逐列峰拟合（单文件或目录批量）
//! - `inspect`: 查看扫描文件的头部元数据和矩阵尺寸
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: fit, inspect

pub mod fit;
pub mod inspect;

use clap::{Parser, Subcommand};

/// scanfit - 扫描数据逐列峰拟合
#[derive(Parser)]
#[command(name = "scanfit")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Column-wise peak fitting for spectroscopic scan matrices", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level for diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Fit every column of a scan file (or a directory of scan files)
    Fit(fit::FitArgs),

    /// Show header metadata and matrix size of a scan file
    Inspect(inspect::InspectArgs),
}
