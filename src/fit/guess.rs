//! # 初值估计
//!
//! 为非线性求解器生成初值 `PeakGuess`，两条路径：
//! - 用户通过对话框输入的初值（Gaussian 族的默认路径）
//! - 基于矩的自动估计（Lorentzian/Voigt 族，或未给出用户初值时）
//!
//! ## 估计方法
//! - 矩估计：`background = min(y)`，权重 `w = y - background`，
//!   `mean = Σxw/Σw`，`σ = sqrt(Σw(x-mean)²/Σw)`，要求 `Σw ≠ 0`
//! - 双峰：在中点索引处把列分成左右两半，分别做矩估计。
//!   这只是假设两峰大致左右分离的近似，不保证峰分离正确
//! - 线性背景：首尾两点确定斜率与截距
//!
//! ## 依赖关系
//! - 被 `fit/driver.rs` 调用
//! - 结果交给 `fit/executor.rs`

use crate::error::{Result, ScanFitError};
use crate::models::{Baseline, FitModel, LobeGuess, ModelFamily, PeakCount, UserGuess};

/// 一阶/二阶矩估计结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub sigma: f64,
    pub background: f64,
}

/// 线性背景初值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBaseline {
    pub slope: f64,
    pub intercept: f64,
}

/// 背景初值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineGuess {
    Constant(f64),
    Linear(LinearBaseline),
}

/// 一次拟合调用的初值，不跨列保存
#[derive(Debug, Clone, PartialEq)]
pub struct PeakGuess {
    pub lobes: Vec<LobeGuess>,
    pub baseline: BaselineGuess,
}

impl PeakGuess {
    /// 按 [`FitModel::param_names`] 布局展开为参数向量
    pub fn to_params(&self) -> Vec<f64> {
        let mut params: Vec<f64> = self
            .lobes
            .iter()
            .flat_map(|l| [l.amplitude, l.center, l.width])
            .collect();
        match self.baseline {
            BaselineGuess::Constant(b) => params.push(b),
            BaselineGuess::Linear(line) => {
                params.push(line.slope);
                params.push(line.intercept);
            }
        }
        params
    }

    /// 检查初值与模型匹配，且振幅非零、宽度为正
    pub fn validate(&self, model: FitModel) -> Result<()> {
        if self.lobes.len() != model.lobe_count() {
            return Err(ScanFitError::precondition(
                "peak guess",
                format!(
                    "{} lobe guesses supplied for a {}-peak model",
                    self.lobes.len(),
                    model.lobe_count()
                ),
            ));
        }

        let baseline_matches = matches!(
            (model.baseline(), &self.baseline),
            (Baseline::Constant, BaselineGuess::Constant(_))
                | (Baseline::Linear, BaselineGuess::Linear(_))
        );
        if !baseline_matches {
            return Err(ScanFitError::precondition(
                "peak guess",
                format!("baseline guess does not match the {} model", model),
            ));
        }

        check_lobes(&self.lobes)
    }
}

/// 检查用户初值能否用于该模型（峰数、振幅、宽度、位置）
///
/// 与数据无关，扫描开始前调用一次。
pub fn check_user_guess(model: FitModel, guess: &UserGuess) -> Result<()> {
    check_lobes(&user_lobes(model, guess)?)
}

fn check_lobes(lobes: &[LobeGuess]) -> Result<()> {
    for (k, lobe) in lobes.iter().enumerate() {
        if lobe.amplitude == 0.0 || !lobe.amplitude.is_finite() {
            return Err(ScanFitError::precondition(
                "peak guess",
                format!("peak {} amplitude guess must be finite and nonzero", k + 1),
            ));
        }
        if lobe.width <= 0.0 || !lobe.width.is_finite() {
            return Err(ScanFitError::precondition(
                "peak guess",
                format!("peak {} width guess must be strictly positive", k + 1),
            ));
        }
        if !lobe.center.is_finite() {
            return Err(ScanFitError::precondition(
                "peak guess",
                format!("peak {} center guess is not finite", k + 1),
            ));
        }
    }

    Ok(())
}

/// 加权矩估计
///
/// 权重为 `y - min(y)`，基线噪声低于零的列同样可用。
pub fn moments(xx: &[f64], yy: &[f64]) -> Result<Moments> {
    check_pair("moment estimate", xx, yy)?;

    if yy.iter().any(|y| !y.is_finite()) {
        return Err(ScanFitError::precondition(
            "moment estimate",
            "intensities must be finite",
        ));
    }

    let background = yy.iter().copied().fold(f64::INFINITY, f64::min);
    let weights: Vec<f64> = yy.iter().map(|y| y - background).collect();

    let sum_w: f64 = weights.iter().sum();
    if sum_w == 0.0 {
        return Err(ScanFitError::precondition(
            "moment estimate",
            "sum of intensities above the minimum is zero",
        ));
    }

    let mean = xx.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / sum_w;
    let second = xx
        .iter()
        .zip(&weights)
        .map(|(x, w)| w * (x - mean).powi(2))
        .sum::<f64>()
        / sum_w;

    Ok(Moments {
        mean,
        sigma: second.sqrt(),
        background,
    })
}

/// 首尾两点确定的线性背景
pub fn linear_endpoints(xx: &[f64], yy: &[f64]) -> Result<LinearBaseline> {
    check_pair("linear baseline", xx, yy)?;

    let (x1, y1) = (xx[0], yy[0]);
    let (x2, y2) = (xx[xx.len() - 1], yy[yy.len() - 1]);

    if x1 == x2 {
        return Err(ScanFitError::precondition(
            "linear baseline",
            "first and last positions coincide (need at least 2 distinct bins)",
        ));
    }

    let slope = (y2 - y1) / (x2 - x1);
    Ok(LinearBaseline {
        slope,
        intercept: y2 - slope * x2,
    })
}

/// 为给定模型估计初值
///
/// 给出用户初值时直接使用（背景仍由数据估计），否则走矩估计。
pub fn estimate(
    model: FitModel,
    xx: &[f64],
    yy: &[f64],
    user: Option<&UserGuess>,
) -> Result<PeakGuess> {
    check_pair("initial guess", xx, yy)?;

    let baseline = match model.baseline() {
        Baseline::Constant => {
            BaselineGuess::Constant(yy.iter().copied().fold(f64::INFINITY, f64::min))
        }
        Baseline::Linear => BaselineGuess::Linear(linear_endpoints(xx, yy)?),
    };

    let lobes = match user {
        Some(guess) => user_lobes(model, guess)?,
        None => auto_lobes(model, xx, yy)?,
    };

    let guess = PeakGuess { lobes, baseline };
    guess.validate(model)?;
    Ok(guess)
}

fn user_lobes(model: FitModel, guess: &UserGuess) -> Result<Vec<LobeGuess>> {
    match model.peaks {
        PeakCount::One => Ok(vec![guess.peak1]),
        PeakCount::Two => match guess.peak2 {
            Some(peak2) => Ok(vec![guess.peak1, peak2]),
            None => Err(ScanFitError::precondition(
                "initial guess",
                "two-peak model requires a guess for peak 2",
            )),
        },
    }
}

fn auto_lobes(model: FitModel, xx: &[f64], yy: &[f64]) -> Result<Vec<LobeGuess>> {
    match model.peaks {
        PeakCount::One => Ok(vec![moment_lobe(model.family, xx, yy)?]),
        PeakCount::Two => {
            let mid = xx.len() / 2;
            if mid == 0 {
                return Err(ScanFitError::precondition(
                    "initial guess",
                    "column too short to split into two halves",
                ));
            }
            Ok(vec![
                moment_lobe(model.family, &xx[..mid], &yy[..mid])?,
                moment_lobe(model.family, &xx[mid..], &yy[mid..])?,
            ])
        }
    }
}

/// 一段数据的矩估计峰初值
///
/// Gaussian 的振幅为峰高 `max - min`；Lorentzian/Voigt 的振幅为面积 `Σ(y - min)·Δx`。
fn moment_lobe(family: ModelFamily, xx: &[f64], yy: &[f64]) -> Result<LobeGuess> {
    let m = moments(xx, yy)?;
    let max_y = yy.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let amplitude = match family {
        ModelFamily::Gaussian => max_y - m.background,
        ModelFamily::Lorentzian | ModelFamily::Voigt => {
            let dx = if xx.len() > 1 {
                (xx[xx.len() - 1] - xx[0]).abs() / (xx.len() - 1) as f64
            } else {
                1.0
            };
            yy.iter().map(|y| (y - m.background) * dx).sum()
        }
    };

    Ok(LobeGuess {
        amplitude,
        center: m.mean,
        width: m.sigma,
    })
}

fn check_pair(context: &str, xx: &[f64], yy: &[f64]) -> Result<()> {
    if xx.len() != yy.len() {
        return Err(ScanFitError::precondition(
            context,
            format!("x has {} values but y has {}", xx.len(), yy.len()),
        ));
    }
    if xx.is_empty() {
        return Err(ScanFitError::precondition(context, "no data points"));
    }
    Ok(())
}
