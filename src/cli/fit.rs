//! # fit 子命令 CLI 定义
//!
//! 峰型族、峰数、用户初值、晶格换算参数和输出选项。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fit.rs`

use scanfit::models::{LobeGuess, ModelFamily, PeakCount, SessionConfig, UserGuess};
use scanfit::plot::PlotFormat;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 峰型族
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FamilyArg {
    /// Gaussian with constant background
    Gaussian,
    /// Lorentzian with linear background
    Lorentzian,
    /// Voigt with linear background
    Voigt,
}

impl From<FamilyArg> for ModelFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Gaussian => ModelFamily::Gaussian,
            FamilyArg::Lorentzian => ModelFamily::Lorentzian,
            FamilyArg::Voigt => ModelFamily::Voigt,
        }
    }
}

/// 图像输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PlotFormatArg {
    /// PNG image
    Png,
    /// SVG vector image
    Svg,
    /// Do not render plots
    None,
}

impl PlotFormatArg {
    pub fn to_format(self) -> Option<PlotFormat> {
        match self {
            PlotFormatArg::Png => Some(PlotFormat::Png),
            PlotFormatArg::Svg => Some(PlotFormat::Svg),
            PlotFormatArg::None => None,
        }
    }
}

/// fit 子命令参数
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Input: scan file or directory containing scan files
    pub input: PathBuf,

    /// Output directory for tables, curves and plots
    #[arg(short, long, default_value = "scanfit_output")]
    pub output: PathBuf,

    /// Peak-shape family
    #[arg(short, long, value_enum, default_value = "gaussian")]
    pub family: FamilyArg,

    /// Number of peaks per column (1 or 2)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub peaks: u8,

    /// Initial amplitude of peak 1 (enables user guesses)
    #[arg(long, requires_all = ["pos", "width"])]
    pub amp: Option<f64>,

    /// Initial center (bin) of peak 1
    #[arg(long, requires_all = ["amp", "width"])]
    pub pos: Option<f64>,

    /// Initial width (bins) of peak 1
    #[arg(long, requires_all = ["amp", "pos"])]
    pub width: Option<f64>,

    /// Initial amplitude of peak 2
    #[arg(long, requires_all = ["amp", "pos2", "width2"])]
    pub amp2: Option<f64>,

    /// Initial center (bin) of peak 2
    #[arg(long, requires_all = ["amp", "amp2", "width2"])]
    pub pos2: Option<f64>,

    /// Initial width (bins) of peak 2
    #[arg(long, requires_all = ["amp", "amp2", "pos2"])]
    pub width2: Option<f64>,

    /// Lower L bound (overrides the scan header)
    #[arg(long)]
    pub l_min: Option<f64>,

    /// Upper L bound (overrides the scan header)
    #[arg(long)]
    pub l_max: Option<f64>,

    /// Lattice constant (overrides the scan header)
    #[arg(long)]
    pub lattice_element: Option<f64>,

    /// Peak voltage of the sweep (overrides the scan header)
    #[arg(long)]
    pub voltage: Option<f64>,

    /// Plot format for diagnostic and summary plots
    #[arg(long, value_enum, default_value = "png")]
    pub plot_format: PlotFormatArg,

    /// Render per-column fit plots for the first N columns, then skip the rest
    #[arg(long, default_value_t = 0)]
    pub each_fit: usize,

    /// Use quadrature instead of linear error propagation for amplitude x width
    #[arg(long, default_value_t = false)]
    pub quadrature: bool,

    /// Maximum solver iterations per column (default: 200 x (parameters + 1))
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// File pattern for batch mode (comma-separated, e.g., "*.dat,*.txt")
    #[arg(long, default_value = "*.dat")]
    pub pattern: String,

    /// Recursively search subdirectories in batch mode
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs in batch mode (0 = all CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Overwrite existing outputs
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}

impl FitArgs {
    pub fn peak_count(&self) -> PeakCount {
        if self.peaks == 2 {
            PeakCount::Two
        } else {
            PeakCount::One
        }
    }

    /// 用户初值：未给出 `--amp` 时为 `None`（改用矩估计）
    pub fn user_guess(&self) -> Option<UserGuess> {
        let peak1 = LobeGuess {
            amplitude: self.amp?,
            center: self.pos?,
            width: self.width?,
        };
        let peak2 = match (self.amp2, self.pos2, self.width2) {
            (Some(amplitude), Some(center), Some(width)) => Some(LobeGuess {
                amplitude,
                center,
                width,
            }),
            _ => None,
        };
        Some(UserGuess { peak1, peak2 })
    }

    pub fn session(&self) -> SessionConfig {
        let session = SessionConfig::new(self.family.into(), self.peak_count());
        match self.user_guess() {
            Some(guess) => session.with_guess(guess),
            None => session,
        }
    }
}
