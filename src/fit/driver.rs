//! # 列迭代驱动器
//!
//! 按列索引顺序（0..nCol-1）逐列执行：取列 → 构造 bin 轴 → 估计初值 →
//! 拟合 → 写入参数表。
//!
//! 输入为空、行数不足或用户初值不可用时，在拟合任何列之前返回
//! `PreconditionViolation`。单列失败（前置条件或不收敛）只标记该行失败，
//! 不中断扫描；所有列都失败时返回 `NoColumnFitted`。
//!
//! 每列记录完成后调用外部回调，回调返回 `SkipRemaining` 后本次扫描
//! 不再回调（拟合照常继续），该标志只在本次扫描内有效。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs` 和库使用者调用
//! - 使用 `fit/guess.rs`, `fit/executor.rs`, `fit/table.rs`

use crate::error::{Result, ScanFitError};
use crate::fit::executor::{FitExecutor, FitResult};
use crate::fit::guess;
use crate::fit::solver::SolverOptions;
use crate::fit::table::ParameterTable;
use crate::models::{BinAxis, ScanSource, SessionConfig};

use log::{debug, info, warn};

/// 回调的返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDecision {
    /// 继续逐列回调
    Proceed,
    /// 本次扫描余下的列不再回调
    SkipRemaining,
}

/// 单列的处理结果
#[derive(Debug)]
pub enum ColumnFit {
    Fitted(FitResult),
    Failed(ScanFitError),
}

impl ColumnFit {
    pub fn result(&self) -> Option<&FitResult> {
        match self {
            ColumnFit::Fitted(fit) => Some(fit),
            ColumnFit::Failed(_) => None,
        }
    }
}

/// 传给回调的单列报告
#[derive(Debug)]
pub struct ColumnReport<'a> {
    pub index: usize,
    pub xx: &'a [f64],
    pub yy: &'a [f64],
    pub fit: &'a ColumnFit,
}

/// 一次扫描的结果
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub table: ParameterTable,
    /// 回调被调用的列数
    pub displayed: usize,
    /// 是否在扫描中途收到 `SkipRemaining`
    pub display_skipped: bool,
}

/// 列迭代驱动器
#[derive(Debug, Clone, Default)]
pub struct ColumnDriver {
    executor: FitExecutor,
}

impl ColumnDriver {
    pub fn new(options: SolverOptions) -> Self {
        Self {
            executor: FitExecutor::new(options),
        }
    }

    /// 扫描所有列，每列记录后回调 `on_column`
    pub fn run_sweep<S, F>(
        &self,
        scan: &S,
        session: &SessionConfig,
        mut on_column: F,
    ) -> Result<SweepReport>
    where
        S: ScanSource + ?Sized,
        F: FnMut(&ColumnReport<'_>) -> ColumnDecision,
    {
        let model = session.model();
        let n_rows = scan.row_count();
        let n_cols = scan.column_count();

        if n_rows == 0 || n_cols == 0 {
            return Err(ScanFitError::precondition(
                "column sweep",
                format!("scan matrix is empty ({} rows x {} columns)", n_rows, n_cols),
            ));
        }
        if n_rows < model.param_count() + 1 {
            return Err(ScanFitError::precondition(
                "column sweep",
                format!(
                    "{} bins are too few for the {} model ({} parameters)",
                    n_rows,
                    model,
                    model.param_count()
                ),
            ));
        }

        if let Some(user) = &session.user_guess {
            guess::check_user_guess(model, user)?;
        }

        let axis = BinAxis::indices(n_rows);
        let xx = axis.values();
        let mut table = ParameterTable::new(n_cols, n_rows, model.peaks);
        let mut first_failure: Option<String> = None;
        let mut display_skipped = false;
        let mut displayed = 0;

        for index in 0..n_cols {
            let yy = scan.column(index);

            let fit = match self.fit_column(session, xx, &yy) {
                Ok(fit) => {
                    debug!(
                        "column {}: {} fitted in {} iterations (ssr = {:.4e})",
                        index, model, fit.iterations, fit.ssr
                    );
                    if !fit.has_uncertainties() {
                        warn!("column {}: covariance unavailable, errors left empty", index);
                    }
                    table.record_column(index, &fit)?;
                    ColumnFit::Fitted(fit)
                }
                Err(err) => {
                    warn!("column {} skipped ({}): {}", index, err.class(), err);
                    table.record_failure(index, err.to_string())?;
                    first_failure.get_or_insert_with(|| err.to_string());
                    ColumnFit::Failed(err)
                }
            };

            if !display_skipped {
                displayed += 1;
                let report = ColumnReport {
                    index,
                    xx,
                    yy: &yy,
                    fit: &fit,
                };
                if on_column(&report) == ColumnDecision::SkipRemaining {
                    display_skipped = true;
                }
            }
        }

        info!(
            "{} sweep: {} of {} columns fitted, {} failed",
            model,
            table.fitted_count(),
            n_cols,
            table.failed_count()
        );

        if table.fitted_count() == 0 {
            return Err(ScanFitError::NoColumnFitted {
                columns: n_cols,
                first_failure: first_failure.unwrap_or_default(),
            });
        }

        Ok(SweepReport {
            table,
            displayed,
            display_skipped,
        })
    }

    /// 扫描所有列，不回调
    pub fn run_fit<S>(&self, scan: &S, session: &SessionConfig) -> Result<ParameterTable>
    where
        S: ScanSource + ?Sized,
    {
        self.run_sweep(scan, session, |_| ColumnDecision::Proceed)
            .map(|report| report.table)
    }

    fn fit_column(&self, session: &SessionConfig, xx: &[f64], yy: &[f64]) -> Result<FitResult> {
        let model = session.model();
        let guess = guess::estimate(model, xx, yy, session.user_guess.as_ref())?;
        self.executor.fit(model, xx, yy, &guess)
    }
}

/// 用默认求解器选项拟合整个扫描矩阵
pub fn run_fit<S>(scan: &S, session: &SessionConfig) -> Result<ParameterTable>
where
    S: ScanSource + ?Sized,
{
    ColumnDriver::default().run_fit(scan, session)
}
