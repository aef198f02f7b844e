//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `utils/` 以及 `scanfit` 库
//! - 子模块: fit, inspect

pub mod fit;
pub mod inspect;

use crate::cli::Commands;
use scanfit::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Fit(args) => fit::execute(args),
        Commands::Inspect(args) => inspect::execute(args),
    }
}
