//! # 派生量
//!
//! 基于参数表计算的一维序列，每次按需重新计算，不缓存：
//! - 振幅 × 宽度（带误差传递）
//! - 相对首元素的百分比变化
//! - bin 位置 → 晶格单位
//! - 电压扫描轴
//!
//! 失败或未拟合的行在派生序列中为 `None`。
//!
//! ## 依赖关系
//! - 读取 `fit/table.rs`
//! - 使用 `models/instrument.rs` 的换算参数

use crate::error::{Result, ScanFitError};
use crate::fit::table::{ParamKind, ParameterTable};
use crate::models::PhysicalUnitParams;

/// 派生序列，长度等于扫描列数
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSeries {
    pub values: Vec<Option<f64>>,
    /// 无误差信息时为 `None`
    pub errors: Option<Vec<Option<f64>>>,
}

impl DerivedSeries {
    /// 不带误差的序列
    pub fn from_values(values: Vec<Option<f64>>) -> Self {
        Self {
            values,
            errors: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 第 `i` 个误差
    pub fn error(&self, i: usize) -> Option<f64> {
        self.errors.as_ref().and_then(|e| e.get(i).copied().flatten())
    }
}

/// 振幅 × 宽度的误差传递方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// 线性叠加：`w·a_err + a·w_err`（即 `y·a_err/a + y·w_err/w`）
    #[default]
    Linear,
    /// 平方和开方：`sqrt((w·a_err)² + (a·w_err)²)`，不含协方差项
    Quadrature,
}

/// 第 `peak` 个峰（从 0 开始）的振幅 × 宽度
pub fn amplitude_times_width(
    table: &ParameterTable,
    peak: usize,
    propagation: Propagation,
) -> Result<DerivedSeries> {
    let (amplitude, amplitude_error) = table.series(peak, ParamKind::Amplitude)?;
    let (width, width_error) = table.series(peak, ParamKind::Width)?;

    let mut values = Vec::with_capacity(table.row_count());
    let mut errors = Vec::with_capacity(table.row_count());

    for i in 0..table.row_count() {
        match (amplitude[i], width[i]) {
            (Some(a), Some(w)) => {
                values.push(Some(a * w));
                let error = match (amplitude_error[i], width_error[i]) {
                    (Some(ea), Some(ew)) => Some(product_error(a, ea, w, ew, propagation)),
                    _ => None,
                };
                errors.push(error);
            }
            _ => {
                values.push(None);
                errors.push(None);
            }
        }
    }

    Ok(DerivedSeries {
        values,
        errors: Some(errors),
    })
}

fn product_error(a: f64, a_err: f64, w: f64, w_err: f64, propagation: Propagation) -> f64 {
    match propagation {
        Propagation::Linear => (w * a_err).abs() + (a * w_err).abs(),
        Propagation::Quadrature => (w * a_err).hypot(a * w_err),
    }
}

/// 相对首元素的百分比变化：`(s[i] - s[0]) / s[0] · 100`
///
/// 首元素为 0、缺失或序列为空时失败。
pub fn percent_change(series: &DerivedSeries) -> Result<DerivedSeries> {
    let reference = match series.values.first() {
        None => {
            return Err(ScanFitError::precondition(
                "percent change",
                "series is empty",
            ))
        }
        Some(None) => {
            return Err(ScanFitError::precondition(
                "percent change",
                "reference value (index 0) is missing",
            ))
        }
        Some(Some(v)) => *v,
    };
    if reference == 0.0 || !reference.is_finite() {
        return Err(ScanFitError::precondition(
            "percent change",
            format!("reference value (index 0) is {}", reference),
        ));
    }

    let values = series
        .values
        .iter()
        .map(|v| v.map(|v| (v - reference) / reference * 100.0))
        .collect();

    Ok(DerivedSeries::from_values(values))
}

/// bin 位置 → 晶格单位
///
/// `unit = latticeElement / ((pos/totalBins · (lMax - lMin) + lMin) / 2)`
pub fn position_to_lattice_unit(
    bin_position: f64,
    total_bins: usize,
    params: &PhysicalUnitParams,
) -> Result<f64> {
    if total_bins == 0 {
        return Err(ScanFitError::precondition(
            "lattice unit",
            "total bin count is zero",
        ));
    }

    let l = bin_position / total_bins as f64 * (params.l_max - params.l_min) + params.l_min;
    let denominator = l / 2.0;
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(ScanFitError::precondition(
            "lattice unit",
            format!("L at bin {} evaluates to {}", bin_position, l),
        ));
    }

    Ok(params.lattice_element / denominator)
}

/// 第 `peak` 个峰的中心换算为晶格单位，`totalBins` 取表的 bin 数
pub fn lattice_positions(
    table: &ParameterTable,
    peak: usize,
    params: &PhysicalUnitParams,
) -> Result<DerivedSeries> {
    let (centers, _) = table.series(peak, ParamKind::Center)?;
    let values = centers
        .into_iter()
        .map(|c| {
            c.map(|c| position_to_lattice_unit(c, table.bin_count(), params))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DerivedSeries::from_values(values))
}

/// 扫描电压轴：从 `-V/2` 升到 `V/2` 再降回
///
/// `dx = V/(n/2)`，起点 `-V/2 + dx/2`，升 `n/2` 点，重复最后一点，
/// 再降 `n/2 - 1` 点。要求 `n >= 2` 且为偶数。
pub fn voltage_sweep(peak_voltage: f64, column_count: usize) -> Result<Vec<f64>> {
    if column_count < 2 || column_count % 2 != 0 {
        return Err(ScanFitError::precondition(
            "voltage sweep",
            format!(
                "column count must be even and at least 2, got {}",
                column_count
            ),
        ));
    }
    if !peak_voltage.is_finite() {
        return Err(ScanFitError::precondition(
            "voltage sweep",
            format!("peak voltage is {}", peak_voltage),
        ));
    }

    let half = column_count / 2;
    let dx = peak_voltage / half as f64;

    let mut sweep = Vec::with_capacity(column_count);
    let mut v = -peak_voltage / 2.0 + dx / 2.0;
    sweep.push(v);
    for _ in 1..half {
        v += dx;
        sweep.push(v);
    }
    sweep.push(v);
    for _ in 1..half {
        v -= dx;
        sweep.push(v);
    }

    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::executor::{FitResult, ParamEstimate};
    use crate::models::{FitModel, ModelFamily, PeakCount};
    use approx::assert_relative_eq;

    fn table_with(rows: &[([f64; 4], [f64; 4])]) -> ParameterTable {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        let mut table = ParameterTable::new(rows.len(), 100, PeakCount::One);
        for (i, (values, errors)) in rows.iter().enumerate() {
            let params = model
                .param_names()
                .into_iter()
                .enumerate()
                .map(|(k, name)| ParamEstimate {
                    name,
                    value: values[k],
                    std_error: Some(errors[k]),
                })
                .collect();
            let fit = FitResult {
                model,
                params,
                curve: vec![0.0; 100],
                ssr: 0.0,
                iterations: 1,
            };
            table.record_column(i, &fit).unwrap();
        }
        table
    }

    #[test]
    fn test_amplitude_times_width_linear_error() {
        let table = table_with(&[([10.0, 50.0, 5.0, 1.0], [0.1, 0.0, 0.2, 0.0])]);
        let series = amplitude_times_width(&table, 0, Propagation::Linear).unwrap();

        assert_relative_eq!(series.values[0].unwrap(), 50.0);
        // y·ea/a + y·ew/w = 50·0.01 + 50·0.04
        assert_relative_eq!(series.error(0).unwrap(), 2.5);

        let series = amplitude_times_width(&table, 0, Propagation::Quadrature).unwrap();
        assert_relative_eq!(series.error(0).unwrap(), (0.5f64 * 0.5 + 2.0 * 2.0).sqrt());
    }

    #[test]
    fn test_amplitude_times_width_zero_errors() {
        let table = table_with(&[
            ([10.0, 50.0, 5.0, 1.0], [0.0; 4]),
            ([20.0, 40.0, 8.0, 2.0], [0.0; 4]),
        ]);
        let series = amplitude_times_width(&table, 0, Propagation::Linear).unwrap();
        assert_eq!(series.values, vec![Some(50.0), Some(160.0)]);
        assert_eq!(series.errors, Some(vec![Some(0.0), Some(0.0)]));
    }

    #[test]
    fn test_amplitude_times_width_skips_failed_rows() {
        let mut table = table_with(&[
            ([10.0, 50.0, 5.0, 1.0], [0.0; 4]),
            ([20.0, 40.0, 8.0, 2.0], [0.0; 4]),
        ]);
        table.record_failure(1, "did not converge").unwrap();

        let series = amplitude_times_width(&table, 0, Propagation::Linear).unwrap();
        assert_eq!(series.values, vec![Some(50.0), None]);
        assert!(amplitude_times_width(&table, 1, Propagation::Linear).is_err());
    }

    #[test]
    fn test_percent_change() {
        let series = DerivedSeries::from_values(vec![Some(4.0), Some(5.0), None, Some(2.0)]);
        let change = percent_change(&series).unwrap();
        assert_eq!(change.values, vec![Some(0.0), Some(25.0), None, Some(-50.0)]);
        assert!(change.errors.is_none());
    }

    #[test]
    fn test_percent_change_zero_reference() {
        let series = DerivedSeries::from_values(vec![Some(0.0), Some(5.0), Some(10.0)]);
        let err = percent_change(&series).unwrap_err();
        assert!(matches!(err, ScanFitError::PreconditionViolation { .. }));

        assert!(percent_change(&DerivedSeries::from_values(vec![])).is_err());
        assert!(percent_change(&DerivedSeries::from_values(vec![None, Some(1.0)])).is_err());
    }

    #[test]
    fn test_position_to_lattice_unit() {
        let params = PhysicalUnitParams {
            l_min: 1.0,
            l_max: 3.0,
            lattice_element: 6.0,
        };
        // L = 50/100·2 + 1 = 2 → 6 / 1
        assert_relative_eq!(position_to_lattice_unit(50.0, 100, &params).unwrap(), 6.0);
        // L = 1 → 6 / 0.5
        assert_relative_eq!(position_to_lattice_unit(0.0, 100, &params).unwrap(), 12.0);
    }

    #[test]
    fn test_position_to_lattice_unit_zero_denominator() {
        let params = PhysicalUnitParams {
            l_min: -1.0,
            l_max: 1.0,
            lattice_element: 6.0,
        };
        assert!(position_to_lattice_unit(50.0, 100, &params).is_err());
        assert!(position_to_lattice_unit(10.0, 0, &params).is_err());
    }

    #[test]
    fn test_lattice_positions_use_bin_count() {
        let table = table_with(&[([10.0, 50.0, 5.0, 1.0], [0.0; 4])]);
        let params = PhysicalUnitParams {
            l_min: 1.0,
            l_max: 3.0,
            lattice_element: 6.0,
        };
        let series = lattice_positions(&table, 0, &params).unwrap();
        assert_relative_eq!(series.values[0].unwrap(), 6.0);
    }

    #[test]
    fn test_voltage_sweep() {
        let sweep = voltage_sweep(4.0, 4).unwrap();
        // dx = 2，起点 -1
        assert_eq!(sweep, vec![-1.0, 1.0, 1.0, -1.0]);

        let sweep = voltage_sweep(10.0, 10).unwrap();
        assert_eq!(sweep.len(), 10);
        assert_relative_eq!(sweep[0], -4.0);
        assert_relative_eq!(sweep[4], 4.0);
        assert_relative_eq!(sweep[5], 4.0);
        assert_relative_eq!(sweep[9], -4.0);
    }

    #[test]
    fn test_voltage_sweep_rejects_odd_count() {
        assert!(voltage_sweep(4.0, 3).is_err());
        assert!(voltage_sweep(4.0, 0).is_err());
    }
}
