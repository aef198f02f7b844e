//! # 数据导出
//!
//! 导出拟合结果到 CSV：
//! - 参数表：`column, status, A, eA, C, eC, W, eW[, A2, ...]`
//! - 拟合曲线矩阵：`bin, col0, col1, ...`（失败列为空）
//! - 派生序列：`column, x, value, error`
//!
//! 缺失值（失败行、协方差不可用）写为空单元格。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs` 调用
//! - 读取 `fit/table.rs`, `fit/derived.rs`
//! - 使用 `csv` + `serde` 写入

use crate::error::{Result, ScanFitError};
use crate::fit::table::{ParameterTable, PEAK_BLOCK};
use crate::fit::DerivedSeries;

use serde::Serialize;
use std::path::Path;

const BLOCK_HEADERS: [&str; PEAK_BLOCK] = [
    "amplitude",
    "amplitude_error",
    "center",
    "center_error",
    "width",
    "width_error",
];

/// 派生序列的一行
#[derive(Debug, Serialize)]
struct SeriesRow {
    column: usize,
    x: f64,
    value: Option<f64>,
    error: Option<f64>,
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.8e}", v)).unwrap_or_default()
}

fn flush(wtr: &mut csv::Writer<std::fs::File>, output_path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| ScanFitError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

/// 参数表表头
pub fn table_headers(table: &ParameterTable) -> Vec<String> {
    let mut headers = vec!["column".to_string(), "status".to_string()];
    for peak in 0..table.peaks().get() {
        for name in BLOCK_HEADERS {
            if table.peaks().get() == 1 {
                headers.push(name.to_string());
            } else {
                headers.push(format!("p{}_{}", peak + 1, name));
            }
        }
    }
    headers
}

/// 导出参数表
pub fn table_to_csv(table: &ParameterTable, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record(table_headers(table))?;

    for index in 0..table.row_count() {
        let mut record = vec![
            index.to_string(),
            table
                .status(index)
                .map(|s| s.to_string())
                .unwrap_or_default(),
        ];
        if let Some(row) = table.row(index) {
            record.extend(row.iter().map(|v| cell(*v)));
        }
        wtr.write_record(&record)?;
    }

    flush(&mut wtr, output_path)
}

/// 导出拟合曲线矩阵（行 = bin，列 = 扫描）
pub fn curves_to_csv(table: &ParameterTable, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    let mut headers = vec!["bin".to_string()];
    headers.extend((0..table.row_count()).map(|j| format!("col{}", j)));
    wtr.write_record(&headers)?;

    for bin in 0..table.bin_count() {
        let mut record = vec![bin.to_string()];
        record.extend(
            (0..table.row_count())
                .map(|j| cell(table.fitted_curve(j).and_then(|c| c.get(bin).copied()))),
        );
        wtr.write_record(&record)?;
    }

    flush(&mut wtr, output_path)
}

/// 导出派生序列，`x` 为横轴（电压或列索引）
pub fn series_to_csv(series: &DerivedSeries, x: &[f64], output_path: &Path) -> Result<()> {
    if x.len() != series.len() {
        return Err(ScanFitError::precondition(
            "series export",
            format!("x axis has {} values, series has {}", x.len(), series.len()),
        ));
    }

    let mut wtr = csv::Writer::from_path(output_path)?;

    for (column, value) in series.values.iter().enumerate() {
        wtr.serialize(SeriesRow {
            column,
            x: x[column],
            value: *value,
            error: series.error(column),
        })?;
    }

    flush(&mut wtr, output_path)
}
