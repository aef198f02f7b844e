//! # 解析器模块
//!
//! 扫描数据文件解析。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: scan_file

pub mod scan_file;

pub use scan_file::{parse_scan_content, parse_scan_file, ScanFile};
