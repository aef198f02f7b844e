//! # 图表生成
//!
//! 使用 `plotters` 生成拟合诊断图和汇总序列图。
//!
//! ## 图表类型
//! - 单列诊断图：原始数据（散点）+ 拟合曲线（折线），标题 `<Family> Fit`
//! - 汇总序列图：派生量随电压（或列索引）变化，带误差棒
//!
//! 支持 PNG 和 SVG 输出。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs` 调用
//! - 读取 `fit/derived.rs` 的 DerivedSeries
//! - 使用 `plotters` 渲染图表

use crate::error::{Result, ScanFitError};
use crate::fit::DerivedSeries;
use crate::models::ModelFamily;

use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotFormat {
    #[default]
    Png,
    Svg,
}

impl PlotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PlotFormat::Png => "png",
            PlotFormat::Svg => "svg",
        }
    }
}

/// 图表尺寸与格式
#[derive(Debug, Clone, Copy)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub format: PlotFormat,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            format: PlotFormat::Png,
        }
    }
}

/// 汇总图的坐标轴与标题
#[derive(Debug, Clone)]
pub struct SeriesLabels {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
}

fn plot_error<E: std::fmt::Debug>(e: E) -> ScanFitError {
    ScanFitError::PlotError(format!("{:?}", e))
}

/// 有限值的范围，两端各留 5% 边距
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        lo.abs().max(1.0) * 0.05
    };
    Some((lo - pad, hi + pad))
}

/// 生成单列拟合诊断图
pub fn plot_column_fit(
    xx: &[f64],
    yy: &[f64],
    curve: Option<&[f64]>,
    family: ModelFamily,
    output_path: &Path,
    style: PlotStyle,
) -> Result<()> {
    let title = format!("{} Fit", family);
    match style.format {
        PlotFormat::Svg => {
            let root = SVGBackend::new(output_path, (style.width, style.height)).into_drawing_area();
            draw_column_fit(&root, xx, yy, curve, &title)?;
            root.present().map_err(plot_error)?;
        }
        PlotFormat::Png => {
            let root =
                BitMapBackend::new(output_path, (style.width, style.height)).into_drawing_area();
            draw_column_fit(&root, xx, yy, curve, &title)?;
            root.present().map_err(plot_error)?;
        }
    }
    Ok(())
}

fn draw_column_fit<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    xx: &[f64],
    yy: &[f64],
    curve: Option<&[f64]>,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let (x_min, x_max) = padded_range(xx.iter().copied())
        .ok_or_else(|| ScanFitError::PlotError("no bins to plot".to_string()))?;
    let y_values = yy
        .iter()
        .chain(curve.unwrap_or(&[]).iter())
        .copied();
    let (y_min, y_max) = padded_range(y_values)
        .ok_or_else(|| ScanFitError::PlotError("no finite intensities to plot".to_string()))?;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Bins")
        .y_desc("Intensity")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_error)?;

    let data_color = RGBColor(0, 102, 204);
    chart
        .draw_series(
            xx.iter()
                .zip(yy)
                .map(|(x, y)| Circle::new((*x, *y), 3, data_color.filled())),
        )
        .map_err(plot_error)?
        .label("Data")
        .legend(move |(x, y)| Circle::new((x + 10, y), 3, data_color.filled()));

    if let Some(curve) = curve {
        let fit_color = RGBColor(204, 51, 0);
        chart
            .draw_series(LineSeries::new(
                xx.iter().zip(curve).map(|(x, y)| (*x, *y)),
                fit_color.stroke_width(2),
            ))
            .map_err(plot_error)?
            .label("Fit")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], fit_color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    Ok(())
}

/// 生成汇总序列图（缺失值跳过，误差存在时画误差棒）
pub fn plot_series(
    x: &[f64],
    series: &DerivedSeries,
    labels: &SeriesLabels,
    output_path: &Path,
    style: PlotStyle,
) -> Result<()> {
    if x.len() != series.len() {
        return Err(ScanFitError::precondition(
            "series plot",
            format!("x axis has {} values, series has {}", x.len(), series.len()),
        ));
    }

    match style.format {
        PlotFormat::Svg => {
            let root = SVGBackend::new(output_path, (style.width, style.height)).into_drawing_area();
            draw_series_chart(&root, x, series, labels)?;
            root.present().map_err(plot_error)?;
        }
        PlotFormat::Png => {
            let root =
                BitMapBackend::new(output_path, (style.width, style.height)).into_drawing_area();
            draw_series_chart(&root, x, series, labels)?;
            root.present().map_err(plot_error)?;
        }
    }
    Ok(())
}

/// 序列中可绘制的点：(x, y, 误差)
fn series_points(x: &[f64], series: &DerivedSeries) -> Vec<(f64, f64, Option<f64>)> {
    x.iter()
        .zip(&series.values)
        .enumerate()
        .filter_map(|(i, (x, v))| v.map(|v| (*x, v, series.error(i))))
        .filter(|(_, v, _)| v.is_finite())
        .collect()
}

fn draw_series_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    x: &[f64],
    series: &DerivedSeries,
    labels: &SeriesLabels,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let points = series_points(x, series);
    let (x_min, x_max) = padded_range(points.iter().map(|p| p.0))
        .ok_or_else(|| ScanFitError::PlotError(format!("'{}' has no values", labels.title)))?;
    let (y_min, y_max) = padded_range(points.iter().flat_map(|(_, y, e)| {
        let e = e.unwrap_or(0.0);
        [y - e, y + e]
    }))
    .ok_or_else(|| ScanFitError::PlotError(format!("'{}' has no values", labels.title)))?;

    let mut chart = ChartBuilder::on(root)
        .caption(&labels.title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc(labels.x_desc.as_str())
        .y_desc(labels.y_desc.as_str())
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_error)?;

    let color = RGBColor(0, 102, 204);
    chart
        .draw_series(LineSeries::new(
            points.iter().map(|(x, y, _)| (*x, *y)),
            color.mix(0.4).stroke_width(1),
        ))
        .map_err(plot_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|(x, y, _)| Circle::new((*x, *y), 4, color.filled())),
        )
        .map_err(plot_error)?;

    chart
        .draw_series(points.iter().filter_map(|(x, y, e)| {
            e.filter(|e| e.is_finite() && *e > 0.0)
                .map(|e| ErrorBar::new_vertical(*x, y - e, *y, y + e, color.filled(), 8))
        }))
        .map_err(plot_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_range() {
        let (lo, hi) = padded_range([0.0, 10.0, f64::NAN]).unwrap();
        assert_eq!((lo, hi), (-0.5, 10.5));

        // 单值范围仍有宽度
        let (lo, hi) = padded_range([2.0]).unwrap();
        assert!(lo < 2.0 && hi > 2.0);

        assert!(padded_range(Vec::new()).is_none());
    }

    #[test]
    fn test_series_points_skip_missing() {
        let series = DerivedSeries {
            values: vec![Some(1.0), None, Some(3.0)],
            errors: Some(vec![Some(0.1), None, None]),
        };
        let points = series_points(&[0.0, 1.0, 2.0], &series);
        assert_eq!(points, vec![(0.0, 1.0, Some(0.1)), (2.0, 3.0, None)]);
    }

    #[test]
    fn test_plot_series_axis_mismatch() {
        let series = DerivedSeries::from_values(vec![Some(1.0)]);
        let labels = SeriesLabels {
            title: "Amplitude".to_string(),
            x_desc: "Voltage".to_string(),
            y_desc: "Amplitude".to_string(),
        };
        let err = plot_series(
            &[0.0, 1.0],
            &series,
            &labels,
            Path::new("unused.png"),
            PlotStyle::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScanFitError::PreconditionViolation { .. }));
    }
}
