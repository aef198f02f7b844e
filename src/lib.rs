//! # scanfit - 扫描数据逐列峰拟合
//!
//! 对二维强度矩阵（行 = bin，列 = 扫描）逐列拟合峰型模型，
//! 汇总振幅、中心、宽度及其标准误差，并计算派生量。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── fit/        (拟合核心)
//!   ├── models/     (数据模型)
//!   ├── parsers/    (扫描文件解析)
//!   ├── export.rs   (CSV 导出)
//!   ├── plot.rs     (图表生成)
//!   └── error.rs    (错误处理)
//! ```

pub mod error;
pub mod export;
pub mod fit;
pub mod models;
pub mod parsers;
pub mod plot;

pub use error::{Result, ScanFitError};
pub use fit::{run_fit, ColumnDecision, ColumnDriver, DerivedSeries, FitResult, ParameterTable};
pub use models::{FitModel, ModelFamily, PeakCount, ScanMatrix, SessionConfig};
