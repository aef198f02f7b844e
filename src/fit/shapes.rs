//! # 峰型函数库
//!
//! 纯函数、无副作用。所有峰型共用。
//!
//! ## 峰型定义
//! - Gaussian: `A · exp(-(x-c)² / (2σ²))`，A 为峰高
//! - Lorentzian: `A/π · σ / ((x-c)² + σ²)`，A 为面积，σ 为半高半宽
//! - Voigt: `A · Re[w(z)] / (σ√(2π))`，`z = (x - c + iγ)/(σ√2)`，γ = σ
//!
//! σ 不得为 0，由调用方保证。
//!
//! ## 依赖关系
//! - 被 `fit/executor.rs`, `fit/guess.rs` 使用
//! - 使用 `num-complex` 计算 Faddeeva 函数

use crate::models::{Baseline, FitModel, ModelFamily};

use num_complex::Complex64;
use std::f64::consts::{PI, SQRT_2};

/// 单峰 Gaussian 加常数背景
pub fn gaussian1(x: f64, amplitude: f64, center: f64, sigma: f64, background: f64) -> f64 {
    gaussian_lobe(x, amplitude, center, sigma) + background
}

/// 双峰 Gaussian 加公共常数背景
#[allow(clippy::too_many_arguments)]
pub fn gaussian2(
    x: f64,
    a1: f64,
    a2: f64,
    c1: f64,
    c2: f64,
    s1: f64,
    s2: f64,
    background: f64,
) -> f64 {
    gaussian_lobe(x, a1, c1, s1) + gaussian_lobe(x, a2, c2, s2) + background
}

/// Gaussian 峰（无背景）
pub fn gaussian_lobe(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let d = x - center;
    amplitude * (-d * d / (2.0 * sigma * sigma)).exp()
}

/// Lorentzian 峰（面积归一）
pub fn lorentzian_lobe(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let d = x - center;
    amplitude / PI * sigma / (d * d + sigma * sigma)
}

/// Voigt 峰（面积归一，γ = σ）
pub fn voigt_lobe(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let gamma = sigma;
    let z = Complex64::new(x - center, gamma) / (sigma * SQRT_2);
    amplitude * faddeeva(z).re / (sigma * (2.0 * PI).sqrt())
}

/// 线性背景
pub fn linear(x: f64, slope: f64, intercept: f64) -> f64 {
    slope * x + intercept
}

/// 按峰型族计算单峰
pub fn lobe(family: ModelFamily, x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    match family {
        ModelFamily::Gaussian => gaussian_lobe(x, amplitude, center, sigma),
        ModelFamily::Lorentzian => lorentzian_lobe(x, amplitude, center, sigma),
        ModelFamily::Voigt => voigt_lobe(x, amplitude, center, sigma),
    }
}

/// 在参数向量上计算完整模型
///
/// `params` 布局见 [`FitModel::param_names`]，长度必须等于 `param_count()`。
pub fn evaluate(model: FitModel, x: f64, params: &[f64]) -> f64 {
    let lobes = model.lobe_count();
    let peaks: f64 = (0..lobes)
        .map(|k| {
            let p = &params[3 * k..3 * k + 3];
            lobe(model.family, x, p[0], p[1], p[2])
        })
        .sum();

    let base = &params[3 * lobes..];
    match model.baseline() {
        Baseline::Constant => peaks + base[0],
        Baseline::Linear => peaks + linear(x, base[0], base[1]),
    }
}

/// Faddeeva 函数 w(z) = exp(-z²) erfc(-iz)，要求 Im z >= 0
///
/// Humlíček (1982) W4 有理近似，相对精度约 1e-4。
pub fn faddeeva(z: Complex64) -> Complex64 {
    let x = z.re;
    let y = z.im;
    let t = Complex64::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        // 区域 I
        t * 0.5641896 / (t * t + 0.5)
    } else if s >= 5.5 {
        // 区域 II
        let u = t * t;
        t * (u * 0.5641896 + 1.410474) / (u * (u + 3.0) + 0.75)
    } else if y >= 0.195 * x.abs() - 0.176 {
        // 区域 III
        let num = t * (t * (t * (t * 0.5642236 + 3.778987) + 11.96482) + 20.20933) + 16.4955;
        let den = t * (t * (t * (t * (t + 6.699398) + 21.69274) + 39.27121) + 38.82363) + 16.4955;
        num / den
    } else {
        // 区域 IV
        let u = t * t;
        let num = t
            * (36183.31
                - u * (3321.9905
                    - u * (1540.787 - u * (219.0313 - u * (35.76683 - u * (1.320522 - u * 0.56419))))));
        let den = 32066.6
            - u * (24322.84
                - u * (9022.228
                    - u * (2186.181 - u * (364.2191 - u * (61.57037 - u * (1.841439 - u))))));
        u.exp() - num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeakCount;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian1_peak_value() {
        assert_eq!(gaussian1(50.0, 10.0, 50.0, 5.0, 1.0), 11.0);
        assert_eq!(gaussian1(-3.5, 2.5, -3.5, 0.1, -0.5), 2.0);
    }

    #[test]
    fn test_gaussian1_tails_reach_background() {
        assert_relative_eq!(gaussian1(1e6, 10.0, 50.0, 5.0, 1.0), 1.0);
        assert_relative_eq!(gaussian1(-1e6, 10.0, 50.0, 5.0, 1.0), 1.0);
    }

    #[test]
    fn test_gaussian2_is_sum_of_lobes() {
        let x = 42.0;
        let expected = gaussian_lobe(x, 3.0, 40.0, 2.0) + gaussian_lobe(x, 5.0, 60.0, 4.0) + 0.5;
        assert_relative_eq!(
            gaussian2(x, 3.0, 5.0, 40.0, 60.0, 2.0, 4.0, 0.5),
            expected
        );
    }

    #[test]
    fn test_lorentzian_peak_and_half_width() {
        let peak = lorentzian_lobe(0.0, 1.0, 0.0, 2.0);
        assert_relative_eq!(peak, 1.0 / (PI * 2.0));
        // σ 为半高半宽
        assert_relative_eq!(lorentzian_lobe(2.0, 1.0, 0.0, 2.0), peak / 2.0);
    }

    #[test]
    fn test_faddeeva_on_imaginary_axis() {
        // w(i) = exp(1) erfc(1)
        let w = faddeeva(Complex64::new(0.0, 1.0));
        assert_relative_eq!(w.re, 0.427_583_576_155_807, max_relative = 1e-4);
        assert!(w.im.abs() < 1e-6);

        // 大 |z| 渐近 w(z) ≈ i/(√π z)
        let z = Complex64::new(30.0, 1.0);
        let asymptotic = Complex64::new(0.0, 1.0) / (PI.sqrt() * z);
        let w = faddeeva(z);
        assert_relative_eq!(w.re, asymptotic.re, max_relative = 1e-2);
        assert_relative_eq!(w.im, asymptotic.im, max_relative = 1e-2);
    }

    #[test]
    fn test_voigt_is_area_normalised() {
        let sigma = 1.5;
        let step = 0.05;
        let half_range = 2000.0;
        let n = (2.0 * half_range / step) as usize;
        let area: f64 = (0..=n)
            .map(|i| voigt_lobe(-half_range + i as f64 * step, 7.0, 0.0, sigma) * step)
            .sum();
        assert_relative_eq!(area, 7.0, max_relative = 5e-3);
    }

    #[test]
    fn test_voigt_symmetric_about_center() {
        let left = voigt_lobe(10.0 - 3.0, 2.0, 10.0, 1.2);
        let right = voigt_lobe(10.0 + 3.0, 2.0, 10.0, 1.2);
        assert_relative_eq!(left, right, max_relative = 1e-12);
    }

    #[test]
    fn test_evaluate_matches_named_functions() {
        let g1 = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        assert_relative_eq!(
            evaluate(g1, 47.0, &[10.0, 50.0, 5.0, 1.0]),
            gaussian1(47.0, 10.0, 50.0, 5.0, 1.0)
        );

        let g2 = FitModel::new(ModelFamily::Gaussian, PeakCount::Two);
        assert_relative_eq!(
            evaluate(g2, 47.0, &[3.0, 40.0, 2.0, 5.0, 60.0, 4.0, 0.5]),
            gaussian2(47.0, 3.0, 5.0, 40.0, 60.0, 2.0, 4.0, 0.5)
        );

        let l1 = FitModel::new(ModelFamily::Lorentzian, PeakCount::One);
        assert_relative_eq!(
            evaluate(l1, 3.0, &[2.0, 1.0, 0.5, 0.1, 4.0]),
            lorentzian_lobe(3.0, 2.0, 1.0, 0.5) + 0.1 * 3.0 + 4.0
        );
    }
}
