//! # 拟合会话配置
//!
//! 会话状态（峰型、峰数、用户初值）由外部会话方持有，
//! 以显式值的形式传入拟合核心，核心内部不保存任何全局状态。
//!
//! ## 依赖关系
//! - 被 `fit/` 下所有模块使用
//! - 被 `commands/fit.rs` 从命令行参数构造

use serde::{Deserialize, Serialize};

/// 峰型族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    Gaussian,
    Lorentzian,
    Voigt,
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::Gaussian => write!(f, "Gaussian"),
            ModelFamily::Lorentzian => write!(f, "Lorentzian"),
            ModelFamily::Voigt => write!(f, "Voigt"),
        }
    }
}

/// 峰数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeakCount {
    One,
    Two,
}

impl PeakCount {
    pub fn get(self) -> usize {
        match self {
            PeakCount::One => 1,
            PeakCount::Two => 2,
        }
    }
}

/// 背景类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// 常数背景 `background`
    Constant,
    /// 线性背景 `slope * x + intercept`
    Linear,
}

/// 模型选择器：峰型族 × 峰数
///
/// 参数向量布局为逐峰 (amplitude, center, sigma)，然后是背景参数：
/// - Gaussian: `background`
/// - Lorentzian / Voigt: `slope`, `intercept`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FitModel {
    pub family: ModelFamily,
    pub peaks: PeakCount,
}

impl FitModel {
    pub fn new(family: ModelFamily, peaks: PeakCount) -> Self {
        Self { family, peaks }
    }

    pub fn baseline(&self) -> Baseline {
        match self.family {
            ModelFamily::Gaussian => Baseline::Constant,
            ModelFamily::Lorentzian | ModelFamily::Voigt => Baseline::Linear,
        }
    }

    pub fn lobe_count(&self) -> usize {
        self.peaks.get()
    }

    /// 自由参数个数
    pub fn param_count(&self) -> usize {
        let baseline = match self.baseline() {
            Baseline::Constant => 1,
            Baseline::Linear => 2,
        };
        3 * self.lobe_count() + baseline
    }

    /// 参数名，顺序与参数向量一致
    pub fn param_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.param_count());
        for lobe in 0..self.lobe_count() {
            let prefix = match self.peaks {
                PeakCount::One => String::new(),
                PeakCount::Two => format!("p{}_", lobe + 1),
            };
            names.push(format!("{}amplitude", prefix));
            names.push(format!("{}center", prefix));
            names.push(format!("{}sigma", prefix));
        }
        match self.baseline() {
            Baseline::Constant => names.push("background".to_string()),
            Baseline::Linear => {
                names.push("slope".to_string());
                names.push("intercept".to_string());
            }
        }
        names
    }
}

impl std::fmt::Display for FitModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.peaks {
            PeakCount::One => write!(f, "{}-1", self.family),
            PeakCount::Two => write!(f, "{}-2", self.family),
        }
    }
}

/// 单个峰的初值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LobeGuess {
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
}

/// 用户通过对话框输入的初值（所有列共用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserGuess {
    pub peak1: LobeGuess,
    pub peak2: Option<LobeGuess>,
}

/// 拟合会话配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub model_family: ModelFamily,
    pub peak_count: PeakCount,
    pub user_guess: Option<UserGuess>,
}

impl SessionConfig {
    pub fn new(model_family: ModelFamily, peak_count: PeakCount) -> Self {
        Self {
            model_family,
            peak_count,
            user_guess: None,
        }
    }

    pub fn with_guess(mut self, guess: UserGuess) -> Self {
        self.user_guess = Some(guess);
        self
    }

    pub fn model(&self) -> FitModel {
        FitModel::new(self.model_family, self.peak_count)
    }
}
