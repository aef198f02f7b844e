//! # 拟合执行器
//!
//! 对给定峰型模型和初值执行一次非线性最小二乘拟合，
//! 返回每个参数的值与标准误差，以及拟合曲线。
//!
//! 双峰模型作为一个联合问题求解（所有参数同时优化），
//! 而不是两个独立的单峰拟合，两峰可以相互调整。
//!
//! ## 依赖关系
//! - 被 `fit/driver.rs` 调用
//! - 使用 `fit/solver.rs` 求解
//! - 使用 `fit/shapes.rs` 计算模型

use crate::error::{Result, ScanFitError};
use crate::fit::guess::PeakGuess;
use crate::fit::shapes;
use crate::fit::solver::{self, SolverOptions};
use crate::models::{FitModel, ModelFamily};

/// 单个参数的估计值
#[derive(Debug, Clone, PartialEq)]
pub struct ParamEstimate {
    pub name: String,
    pub value: f64,
    /// 协方差不可用时为 `None`
    pub std_error: Option<f64>,
}

/// 单个峰的拟合参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LobeEstimate {
    pub amplitude: f64,
    pub amplitude_error: Option<f64>,
    pub center: f64,
    pub center_error: Option<f64>,
    pub width: f64,
    pub width_error: Option<f64>,
}

/// 单列单模型的成功拟合结果
#[derive(Debug, Clone)]
pub struct FitResult {
    pub model: FitModel,
    pub params: Vec<ParamEstimate>,
    /// 拟合曲线，每个 bin 一个值
    pub curve: Vec<f64>,
    /// 残差平方和
    pub ssr: f64,
    pub iterations: usize,
}

impl FitResult {
    /// 按名称取参数
    pub fn param(&self, name: &str) -> Option<&ParamEstimate> {
        self.params.iter().find(|p| p.name == name)
    }

    /// 第 `k` 个峰（从 0 开始）的振幅、中心、宽度
    pub fn lobe(&self, k: usize) -> Option<LobeEstimate> {
        if k >= self.model.lobe_count() {
            return None;
        }
        let p = &self.params[3 * k..3 * k + 3];
        Some(LobeEstimate {
            amplitude: p[0].value,
            amplitude_error: p[0].std_error,
            center: p[1].value,
            center_error: p[1].std_error,
            width: p[2].value,
            width_error: p[2].std_error,
        })
    }

    /// 协方差是否可用
    pub fn has_uncertainties(&self) -> bool {
        self.params.iter().all(|p| p.std_error.is_some())
    }
}

/// 拟合执行器
#[derive(Debug, Clone, Default)]
pub struct FitExecutor {
    options: SolverOptions,
}

impl FitExecutor {
    /// 创建新的拟合执行器
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// 拟合 `(xx, yy)`
    pub fn fit(
        &self,
        model: FitModel,
        xx: &[f64],
        yy: &[f64],
        guess: &PeakGuess,
    ) -> Result<FitResult> {
        if xx.len() != yy.len() {
            return Err(ScanFitError::precondition(
                "fit",
                format!("x has {} values but y has {}", xx.len(), yy.len()),
            ));
        }
        if xx.len() < model.param_count() + 1 {
            return Err(ScanFitError::precondition(
                "fit",
                format!(
                    "{} points are too few for the {} model ({} parameters)",
                    xx.len(),
                    model,
                    model.param_count()
                ),
            ));
        }
        guess.validate(model)?;

        let solution = solver::levenberg_marquardt(
            |x, p| shapes::evaluate(model, x, p),
            xx,
            yy,
            &guess.to_params(),
            &self.options,
        )?;

        let mut values = solution.params.clone();
        canonicalize_widths(model, &mut values);

        let errors = solution.standard_errors();
        let params = model
            .param_names()
            .into_iter()
            .enumerate()
            .map(|(i, name)| ParamEstimate {
                name,
                value: values[i],
                std_error: errors.as_ref().map(|e| e[i]),
            })
            .collect();

        let curve = xx
            .iter()
            .map(|x| shapes::evaluate(model, *x, &values))
            .collect();

        Ok(FitResult {
            model,
            params,
            curve,
            ssr: solution.ssr,
            iterations: solution.iterations,
        })
    }
}

/// 负宽度与正宽度给出同一曲线，统一为正宽度
///
/// Gaussian 只依赖 σ²；Lorentzian/Voigt 在 (A, σ) → (-A, -σ) 下不变。
fn canonicalize_widths(model: FitModel, values: &mut [f64]) {
    for k in 0..model.lobe_count() {
        let width = 3 * k + 2;
        if values[width] < 0.0 {
            values[width] = -values[width];
            if model.family != ModelFamily::Gaussian {
                values[3 * k] = -values[3 * k];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::guess::{self, BaselineGuess};
    use crate::models::{LobeGuess, PeakCount};
    use approx::assert_abs_diff_eq;

    fn bins(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_gaussian1_exact_recovery() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        let xx = bins(100);
        let yy: Vec<f64> = xx
            .iter()
            .map(|x| shapes::gaussian1(*x, 10.0, 50.0, 5.0, 1.0))
            .collect();
        let guess = PeakGuess {
            lobes: vec![LobeGuess {
                amplitude: 8.0,
                center: 48.0,
                width: 7.0,
            }],
            baseline: BaselineGuess::Constant(0.5),
        };

        let fit = FitExecutor::default().fit(model, &xx, &yy, &guess).unwrap();
        let lobe = fit.lobe(0).unwrap();

        assert_abs_diff_eq!(lobe.amplitude, 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(lobe.center, 50.0, epsilon = 1e-5);
        assert_abs_diff_eq!(lobe.width, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(fit.param("background").unwrap().value, 1.0, epsilon = 1e-5);
        assert!(lobe.amplitude_error.unwrap() < 1e-4);
        assert_eq!(fit.curve.len(), xx.len());
        assert_abs_diff_eq!(fit.curve[50], 11.0, epsilon = 1e-5);
    }

    #[test]
    fn test_gaussian1_noisy_recovery_tightens_with_noise() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        let xx = bins(100);
        // 确定性伪噪声
        let noise: Vec<f64> = xx
            .iter()
            .map(|x| ((x * 12.9898).sin() * 43758.5453).fract() - 0.5)
            .collect();

        let mut previous_error = f64::INFINITY;
        for scale in [0.5, 0.05, 0.005] {
            let yy: Vec<f64> = xx
                .iter()
                .zip(&noise)
                .map(|(x, e)| shapes::gaussian1(*x, 10.0, 50.0, 5.0, 1.0) + scale * e)
                .collect();
            let guess = guess::estimate(model, &xx, &yy, None).unwrap();
            let fit = FitExecutor::default().fit(model, &xx, &yy, &guess).unwrap();
            let lobe = fit.lobe(0).unwrap();

            let error = (lobe.amplitude - 10.0).abs()
                + (lobe.center - 50.0).abs()
                + (lobe.width - 5.0).abs();
            assert!(error < 40.0 * scale, "scale {}: error {}", scale, error);
            assert!(error < previous_error);
            previous_error = error;
        }
    }

    #[test]
    fn test_gaussian2_joint_fit() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::Two);
        let xx = bins(120);
        let yy: Vec<f64> = xx
            .iter()
            .map(|x| shapes::gaussian2(*x, 8.0, 5.0, 40.0, 75.0, 4.0, 6.0, 0.5))
            .collect();
        let guess = PeakGuess {
            lobes: vec![
                LobeGuess {
                    amplitude: 6.0,
                    center: 38.0,
                    width: 5.0,
                },
                LobeGuess {
                    amplitude: 4.0,
                    center: 78.0,
                    width: 5.0,
                },
            ],
            baseline: BaselineGuess::Constant(0.0),
        };

        let fit = FitExecutor::default().fit(model, &xx, &yy, &guess).unwrap();
        let p1 = fit.lobe(0).unwrap();
        let p2 = fit.lobe(1).unwrap();

        assert_abs_diff_eq!(p1.amplitude, 8.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p1.center, 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p1.width, 4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p2.amplitude, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p2.center, 75.0, epsilon = 1e-4);
        assert_abs_diff_eq!(p2.width, 6.0, epsilon = 1e-4);
        assert!(fit.lobe(2).is_none());
    }

    #[test]
    fn test_lorentzian1_with_linear_baseline() {
        let model = FitModel::new(ModelFamily::Lorentzian, PeakCount::One);
        let xx = bins(80);
        let yy: Vec<f64> = xx
            .iter()
            .map(|x| shapes::lorentzian_lobe(*x, 60.0, 42.0, 3.0) + 0.02 * x + 1.0)
            .collect();
        let guess = guess::estimate(model, &xx, &yy, None).unwrap();

        let fit = FitExecutor::default().fit(model, &xx, &yy, &guess).unwrap();
        let lobe = fit.lobe(0).unwrap();

        assert_abs_diff_eq!(lobe.amplitude, 60.0, epsilon = 1e-3);
        assert_abs_diff_eq!(lobe.center, 42.0, epsilon = 1e-4);
        assert_abs_diff_eq!(lobe.width, 3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(fit.param("slope").unwrap().value, 0.02, epsilon = 1e-5);
        assert_abs_diff_eq!(fit.param("intercept").unwrap().value, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_voigt1_recovery() {
        let model = FitModel::new(ModelFamily::Voigt, PeakCount::One);
        let xx = bins(80);
        let yy: Vec<f64> = xx
            .iter()
            .map(|x| shapes::voigt_lobe(*x, 40.0, 37.0, 2.5) + 0.5)
            .collect();
        let guess = guess::estimate(model, &xx, &yy, None).unwrap();

        let fit = FitExecutor::default().fit(model, &xx, &yy, &guess).unwrap();
        let lobe = fit.lobe(0).unwrap();

        assert_abs_diff_eq!(lobe.amplitude, 40.0, epsilon = 1e-3);
        assert_abs_diff_eq!(lobe.center, 37.0, epsilon = 1e-4);
        assert_abs_diff_eq!(lobe.width, 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_too_few_points_is_precondition() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::Two);
        let xx = bins(7);
        let guess = PeakGuess {
            lobes: vec![
                LobeGuess {
                    amplitude: 1.0,
                    center: 2.0,
                    width: 1.0,
                },
                LobeGuess {
                    amplitude: 1.0,
                    center: 5.0,
                    width: 1.0,
                },
            ],
            baseline: BaselineGuess::Constant(0.0),
        };
        let err = FitExecutor::default()
            .fit(model, &xx, &xx, &guess)
            .unwrap_err();
        assert!(matches!(err, ScanFitError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_negative_width_is_canonicalized() {
        let model = FitModel::new(ModelFamily::Lorentzian, PeakCount::One);
        let mut values = vec![-5.0, 10.0, -2.0, 0.0, 1.0];
        canonicalize_widths(model, &mut values);
        assert_eq!(values, vec![5.0, 10.0, 2.0, 0.0, 1.0]);

        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        let mut values = vec![5.0, 10.0, -2.0, 1.0];
        canonicalize_widths(model, &mut values);
        assert_eq!(values, vec![5.0, 10.0, 2.0, 1.0]);
    }
}
