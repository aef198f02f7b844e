//! # 统一错误处理模块
//!
//! 定义 scanfit 的所有错误类型，使用 `thiserror` 派生。
//!
//! 拟合核心的错误分为三类：
//! - 前置条件违反（在调用求解器之前即失败）
//! - 求解器不收敛（单列失败，由列迭代驱动器捕获）
//! - 协方差不可用不是错误，而是 `FitResult` 中误差字段为 `None`
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// scanfit 统一错误类型
#[derive(Error, Debug)]
pub enum ScanFitError {
    // ─────────────────────────────────────────────────────────────
    // 拟合核心错误
    // ─────────────────────────────────────────────────────────────
    #[error("Precondition violated in {context}: {reason}")]
    PreconditionViolation { context: String, reason: String },

    #[error("Solver did not converge after {iterations} iterations: {reason}")]
    SolverNonConvergence { iterations: usize, reason: String },

    #[error("Data is not fittable: all {columns} columns failed (first failure: {first_failure})")]
    NoColumnFitted {
        columns: usize,
        first_failure: String,
    },

    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse scan file: {path}\nReason: {reason}")]
    ParseError { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 输出错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Plot error: {0}")]
    PlotError(String),
}

impl ScanFitError {
    /// 构造前置条件错误
    pub fn precondition(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanFitError::PreconditionViolation {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// 面向操作者的失败类别名称
    pub fn class(&self) -> &'static str {
        match self {
            ScanFitError::PreconditionViolation { .. } => "precondition violation",
            ScanFitError::SolverNonConvergence { .. } => "solver non-convergence",
            ScanFitError::NoColumnFitted { .. } => "data not fittable",
            ScanFitError::FileReadError { .. }
            | ScanFitError::FileWriteError { .. }
            | ScanFitError::FileNotFound { .. } => "file error",
            ScanFitError::ParseError { .. } => "parse error",
            ScanFitError::InvalidArgument(_) => "invalid argument",
            ScanFitError::CsvError(_) => "csv error",
            ScanFitError::PlotError(_) => "plot error",
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ScanFitError>;
