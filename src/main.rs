//! # scanfit - 扫描数据逐列峰拟合工具
//!
//! 拟合核心在库中（`scanfit::fit`），这里是命令行前端：
//! 读取扫描文件、组装会话配置、输出表格、CSV 和图表。
//!
//! ## 子命令
//! - `fit` - 逐列拟合（Gaussian / Lorentzian / Voigt，单峰或双峰）
//! - `inspect` - 查看扫描文件头部与矩阵尺寸
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     └── scanfit (库: 解析、拟合、导出、绘图)
//!   ├── batch/      (目录批量处理)
//!   └── utils/      (输出、进度条、日志)
//! ```

mod batch;
mod cli;
mod commands;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    let _logger = utils::logging::setup_logging(&cli.log_level);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_failure(e.class(), &e.to_string());
        std::process::exit(1);
    }
}
