//! # 峰拟合核心
//!
//! 逐列峰拟合与参数聚合引擎。
//!
//! ## 子模块
//! - `shapes`: 峰型函数库（Gaussian / Lorentzian / Voigt）
//! - `guess`: 初值估计（矩估计、端点线性背景、用户初值）
//! - `solver`: Levenberg–Marquardt 最小二乘与协方差
//! - `executor`: 单列拟合执行器
//! - `table`: 参数表（结果聚合）
//! - `derived`: 派生量（振幅×宽度、百分比变化、晶格单位、电压轴）
//! - `driver`: 列迭代驱动器
//!
//! ## 依赖关系
//! - 使用 `models/` 的扫描矩阵与会话配置
//! - 被 `commands/fit.rs`, `export.rs`, `plot.rs` 使用

pub mod derived;
pub mod driver;
pub mod executor;
pub mod guess;
pub mod shapes;
pub mod solver;
pub mod table;

pub use derived::{
    amplitude_times_width, lattice_positions, percent_change, position_to_lattice_unit,
    voltage_sweep, DerivedSeries, Propagation,
};
pub use driver::{run_fit, ColumnDecision, ColumnDriver, ColumnFit, ColumnReport, SweepReport};
pub use executor::{FitExecutor, FitResult, LobeEstimate, ParamEstimate};
pub use guess::PeakGuess;
pub use solver::SolverOptions;
pub use table::{ParamKind, ParameterTable, RowStatus};
