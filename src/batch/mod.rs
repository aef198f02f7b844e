//! # 批量处理模块
//!
//! 目录输入时批量拟合多个扫描文件。
//!
//! ## 功能
//! - 自动检测输入类型（文件/目录）
//! - 按 glob 模式收集扫描文件
//! - 文件间并行，单个文件内逐列顺序拟合
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
