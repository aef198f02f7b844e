//! # 日志初始化
//!
//! 使用 `flexi_logger` 把 `log` 门面的诊断输出写到 stderr。
//! `RUST_LOG` 存在时优先于 `--log-level`。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用

use flexi_logger::{Logger, LoggerHandle};

/// 初始化日志；失败时只打印警告，不中断程序
pub fn setup_logging(base_level: &str) -> Option<LoggerHandle> {
    let logger = match Logger::try_with_env_or_str(base_level) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Invalid log level '{}': {}", base_level, e);
            return None;
        }
    };

    match logger.log_to_stderr().start() {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Logger initialization failed: {}", e);
            None
        }
    }
}
