//! # 数据模型模块
//!
//! 定义扫描矩阵、拟合会话配置和仪器元数据。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `fit/` 和 `commands/` 使用
//! - 子模块: scan, session, instrument

pub mod instrument;
pub mod scan;
pub mod session;

pub use instrument::{PhysicalUnitParams, ScanHeader};
pub use scan::{BinAxis, ScanMatrix, ScanSource};
pub use session::{
    Baseline, FitModel, LobeGuess, ModelFamily, PeakCount, SessionConfig, UserGuess,
};
