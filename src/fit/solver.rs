//! # Levenberg–Marquardt 非线性最小二乘求解器
//!
//! 对模型 `f(x; p)` 最小化 `Σ (y - f(x; p))²`。
//!
//! ## 算法概述
//! 1. 中心差分计算 Jacobian
//! 2. 解阻尼正规方程 `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr`
//! 3. 残差下降则接受步长并减小 λ，否则增大 λ 重试
//! 4. 相对下降量或相对步长低于容差即收敛
//! 5. 协方差 `s²·(JᵀJ)⁻¹`，`s² = SSR/(m-n)`
//!
//! ## 参考
//! - Henri P. Gavin, "The Levenberg–Marquardt algorithm for nonlinear least
//!   squares curve-fitting problems"
//! - MINPACK lmdif 的终止准则
//!
//! ## 依赖关系
//! - 被 `fit/executor.rs` 调用
//! - 使用 `nalgebra` 进行线性代数运算

use crate::error::{Result, ScanFitError};

use nalgebra::{DMatrix, DVector};

const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;
const MIN_DIAGONAL: f64 = 1e-12;

/// 求解器选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// 最大迭代次数，`None` 时为 `200 * (n + 1)`
    pub max_iterations: Option<usize>,
    /// 残差平方和的相对下降容差
    pub ftol: f64,
    /// 参数步长的相对容差
    pub xtol: f64,
    /// 初始阻尼因子 λ
    pub initial_damping: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_damping: 1e-3,
        }
    }
}

/// 最小二乘解
#[derive(Debug, Clone)]
pub struct LeastSquaresSolution {
    pub params: Vec<f64>,
    /// 参数协方差，奇异或自由度为零时为 `None`
    pub covariance: Option<DMatrix<f64>>,
    /// 残差平方和
    pub ssr: f64,
    pub iterations: usize,
}

impl LeastSquaresSolution {
    /// 标准误差 = 协方差对角元的平方根
    pub fn standard_errors(&self) -> Option<Vec<f64>> {
        self.covariance
            .as_ref()
            .map(|cov| cov.diagonal().iter().map(|v| v.sqrt()).collect())
    }
}

/// 对 `(xx, yy)` 拟合模型 `model(x, params)`
pub fn levenberg_marquardt<F>(
    model: F,
    xx: &[f64],
    yy: &[f64],
    initial: &[f64],
    options: &SolverOptions,
) -> Result<LeastSquaresSolution>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let m = xx.len();
    let n = initial.len();

    if m != yy.len() {
        return Err(ScanFitError::precondition(
            "least squares",
            format!("x has {} values but y has {}", m, yy.len()),
        ));
    }
    if n == 0 {
        return Err(ScanFitError::precondition(
            "least squares",
            "no free parameters",
        ));
    }
    if m < n + 1 {
        return Err(ScanFitError::precondition(
            "least squares",
            format!("{} points for {} parameters (need at least {})", m, n, n + 1),
        ));
    }

    let max_iterations = options.max_iterations.unwrap_or(200 * (n + 1));

    let mut params = DVector::from_column_slice(initial);
    let mut residuals = residual_vector(&model, xx, yy, params.as_slice());
    if !is_finite(&residuals) {
        return Err(ScanFitError::SolverNonConvergence {
            iterations: 0,
            reason: "model is not finite at the initial guess".to_string(),
        });
    }

    let mut cost = residuals.norm_squared();
    let mut damping = options.initial_damping;
    let mut converged = cost == 0.0;
    let mut iterations = 0;

    while !converged && iterations < max_iterations {
        iterations += 1;

        let jac = jacobian(&model, xx, params.as_slice());
        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &residuals;

        if jtr.amax() == 0.0 {
            converged = true;
            break;
        }

        loop {
            if damping > MAX_DAMPING {
                return Err(ScanFitError::SolverNonConvergence {
                    iterations,
                    reason: "damping grew without reducing the residual".to_string(),
                });
            }

            let mut a = jtj.clone();
            for j in 0..n {
                a[(j, j)] += damping * jtj[(j, j)].max(MIN_DIAGONAL);
            }

            let delta = match solve_normal(a, &jtr) {
                Some(d) => d,
                None => {
                    damping *= 10.0;
                    continue;
                }
            };

            let step_small = delta.norm() <= options.xtol * (params.norm() + options.xtol);
            let trial = &params + &delta;
            let trial_residuals = residual_vector(&model, xx, yy, trial.as_slice());
            let trial_cost = trial_residuals.norm_squared();

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = cost - trial_cost;
                params = trial;
                residuals = trial_residuals;
                converged = step_small || reduction <= options.ftol * cost;
                cost = trial_cost;
                damping = (damping / 10.0).max(MIN_DAMPING);
                break;
            }

            // 在当前点已无法继续下降
            if step_small {
                converged = true;
                break;
            }

            damping *= 10.0;
        }
    }

    if !converged {
        return Err(ScanFitError::SolverNonConvergence {
            iterations,
            reason: format!("iteration budget of {} exhausted", max_iterations),
        });
    }

    let covariance = covariance(&model, xx, params.as_slice(), cost);

    Ok(LeastSquaresSolution {
        params: params.iter().copied().collect(),
        covariance,
        ssr: cost,
        iterations,
    })
}

/// 残差 r = y - f(x; p)
fn residual_vector<F>(model: &F, xx: &[f64], yy: &[f64], params: &[f64]) -> DVector<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    DVector::from_iterator(
        xx.len(),
        xx.iter().zip(yy).map(|(x, y)| y - model(*x, params)),
    )
}

/// 中心差分 Jacobian ∂f/∂p (m × n)
fn jacobian<F>(model: &F, xx: &[f64], params: &[f64]) -> DMatrix<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let m = xx.len();
    let n = params.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut shifted = params.to_vec();

    for j in 0..n {
        let h = f64::EPSILON.cbrt() * params[j].abs().max(1.0);

        shifted[j] = params[j] + h;
        let forward: Vec<f64> = xx.iter().map(|x| model(*x, &shifted)).collect();
        shifted[j] = params[j] - h;
        let backward: Vec<f64> = xx.iter().map(|x| model(*x, &shifted)).collect();
        shifted[j] = params[j];

        for i in 0..m {
            jac[(i, j)] = (forward[i] - backward[i]) / (2.0 * h);
        }
    }

    jac
}

/// 先尝试 Cholesky，失败时退回 LU
fn solve_normal(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let delta = match a.clone().cholesky() {
        Some(chol) => chol.solve(b),
        None => a.lu().solve(b)?,
    };
    if is_finite(&delta) {
        Some(delta)
    } else {
        None
    }
}

fn covariance<F>(model: &F, xx: &[f64], params: &[f64], ssr: f64) -> Option<DMatrix<f64>>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let m = xx.len();
    let n = params.len();
    if m <= n {
        return None;
    }

    let jac = jacobian(model, xx, params);
    let jtj = jac.transpose() * &jac;
    let inverse = jtj.try_inverse()?;
    let cov = inverse * (ssr / (m - n) as f64);

    let usable = cov.diagonal().iter().all(|v| v.is_finite() && *v >= 0.0);
    if usable {
        Some(cov)
    } else {
        None
    }
}

fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}
