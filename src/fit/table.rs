//! # 参数表（结果聚合）
//!
//! 逐列累积拟合参数与标准误差。行 = 扫描列索引，列布局固定：
//!
//! ```text
//! 单峰:  A  eA  C  eC  W  eW
//! 双峰:  A1 eA1 C1 eC1 W1 eW1 | A2 eA2 C2 eC2 W2 eW2
//! ```
//!
//! 每行有状态：未拟合 / 拟合失败 / 拟合成功。失败行的单元格为空，
//! 协方差不可用时误差单元格为空，不以 0 代替。
//!
//! 同时保存每列的拟合曲线（nRow × nCol）。
//!
//! ## 依赖关系
//! - 被 `fit/driver.rs` 填充
//! - 被 `fit/derived.rs`, `export.rs`, `plot.rs` 读取

use crate::error::{Result, ScanFitError};
use crate::fit::executor::FitResult;
use crate::models::PeakCount;

/// 每个峰占用的列数
pub const PEAK_BLOCK: usize = 6;

pub const AMPLITUDE: usize = 0;
pub const AMPLITUDE_ERROR: usize = 1;
pub const CENTER: usize = 2;
pub const CENTER_ERROR: usize = 3;
pub const WIDTH: usize = 4;
pub const WIDTH_ERROR: usize = 5;

/// 峰参数种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Amplitude,
    Center,
    Width,
}

impl ParamKind {
    /// 第 `peak` 个峰（从 0 开始）该参数值所在列
    pub fn offset(self, peak: usize) -> usize {
        let base = match self {
            ParamKind::Amplitude => AMPLITUDE,
            ParamKind::Center => CENTER,
            ParamKind::Width => WIDTH,
        };
        peak * PEAK_BLOCK + base
    }

    /// 对应误差所在列
    pub fn error_offset(self, peak: usize) -> usize {
        self.offset(peak) + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            ParamKind::Amplitude => "Amplitude",
            ParamKind::Center => "Position",
            ParamKind::Width => "Width",
        }
    }
}

/// 行状态
#[derive(Debug, Clone, PartialEq)]
pub enum RowStatus {
    /// 尚未拟合
    Pending,
    /// 拟合失败（原因）
    Failed(String),
    /// 拟合成功
    Fitted,
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowStatus::Pending => write!(f, "pending"),
            RowStatus::Failed(_) => write!(f, "failed"),
            RowStatus::Fitted => write!(f, "fitted"),
        }
    }
}

/// 参数表
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    peaks: PeakCount,
    bin_count: usize,
    cells: Vec<Option<f64>>,
    status: Vec<RowStatus>,
    curves: Vec<Option<Vec<f64>>>,
}

impl ParameterTable {
    /// `column_count` 行（每个扫描一行），每列曲线长 `bin_count`
    pub fn new(column_count: usize, bin_count: usize, peaks: PeakCount) -> Self {
        let width = PEAK_BLOCK * peaks.get();
        Self {
            peaks,
            bin_count,
            cells: vec![None; column_count * width],
            status: vec![RowStatus::Pending; column_count],
            curves: vec![None; column_count],
        }
    }

    /// 写入一列的拟合结果（重复写入只覆盖该行）
    pub fn record_column(&mut self, index: usize, fit: &FitResult) -> Result<()> {
        self.check_index(index)?;

        if fit.model.peaks != self.peaks {
            return Err(ScanFitError::precondition(
                "parameter table",
                format!(
                    "{} result recorded into a {}-peak table",
                    fit.model,
                    self.peaks.get()
                ),
            ));
        }
        if fit.curve.len() != self.bin_count {
            return Err(ScanFitError::precondition(
                "parameter table",
                format!(
                    "fitted curve has {} bins, table expects {}",
                    fit.curve.len(),
                    self.bin_count
                ),
            ));
        }

        let width = self.width();
        let row = &mut self.cells[index * width..(index + 1) * width];
        for peak in 0..self.peaks.get() {
            // lobe() 在 peak < lobe_count 时总是 Some
            if let Some(lobe) = fit.lobe(peak) {
                let block = &mut row[peak * PEAK_BLOCK..(peak + 1) * PEAK_BLOCK];
                block[AMPLITUDE] = Some(lobe.amplitude);
                block[AMPLITUDE_ERROR] = lobe.amplitude_error;
                block[CENTER] = Some(lobe.center);
                block[CENTER_ERROR] = lobe.center_error;
                block[WIDTH] = Some(lobe.width);
                block[WIDTH_ERROR] = lobe.width_error;
            }
        }

        self.status[index] = RowStatus::Fitted;
        self.curves[index] = Some(fit.curve.clone());
        Ok(())
    }

    /// 标记一列拟合失败，清空该行
    pub fn record_failure(&mut self, index: usize, reason: impl Into<String>) -> Result<()> {
        self.check_index(index)?;

        let width = self.width();
        for cell in &mut self.cells[index * width..(index + 1) * width] {
            *cell = None;
        }
        self.status[index] = RowStatus::Failed(reason.into());
        self.curves[index] = None;
        Ok(())
    }

    /// 行数 = 扫描列数
    pub fn row_count(&self) -> usize {
        self.status.len()
    }

    /// 列数：6 或 12
    pub fn width(&self) -> usize {
        PEAK_BLOCK * self.peaks.get()
    }

    pub fn peaks(&self) -> PeakCount {
        self.peaks
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// 单元格
    pub fn value(&self, row: usize, offset: usize) -> Option<f64> {
        if row >= self.row_count() || offset >= self.width() {
            return None;
        }
        self.cells[row * self.width() + offset]
    }

    /// 整行
    pub fn row(&self, index: usize) -> Option<&[Option<f64>]> {
        if index >= self.row_count() {
            return None;
        }
        let width = self.width();
        Some(&self.cells[index * width..(index + 1) * width])
    }

    /// 一列参数（用于绘图）
    pub fn column(&self, offset: usize) -> Result<Vec<Option<f64>>> {
        if offset >= self.width() {
            return Err(ScanFitError::precondition(
                "parameter table",
                format!("column offset {} outside table width {}", offset, self.width()),
            ));
        }
        Ok((0..self.row_count())
            .map(|row| self.value(row, offset))
            .collect())
    }

    /// 第 `peak` 个峰某参数的 (值, 误差) 列
    pub fn series(
        &self,
        peak: usize,
        kind: ParamKind,
    ) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>)> {
        if peak >= self.peaks.get() {
            return Err(ScanFitError::precondition(
                "parameter table",
                format!("peak {} requested from a {}-peak table", peak + 1, self.peaks.get()),
            ));
        }
        Ok((
            self.column(kind.offset(peak))?,
            self.column(kind.error_offset(peak))?,
        ))
    }

    pub fn status(&self, index: usize) -> Option<&RowStatus> {
        self.status.get(index)
    }

    /// 拟合曲线；失败或未拟合时为 `None`
    pub fn fitted_curve(&self, index: usize) -> Option<&[f64]> {
        self.curves.get(index).and_then(|c| c.as_deref())
    }

    pub fn fitted_count(&self) -> usize {
        self.status
            .iter()
            .filter(|s| matches!(s, RowStatus::Fitted))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.status
            .iter()
            .filter(|s| matches!(s, RowStatus::Failed(_)))
            .count()
    }

    /// 所有行都已处理
    pub fn is_complete(&self) -> bool {
        !self.status.iter().any(|s| matches!(s, RowStatus::Pending))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.row_count() {
            return Err(ScanFitError::precondition(
                "parameter table",
                format!("column {} outside table of {} rows", index, self.row_count()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::executor::ParamEstimate;
    use crate::models::{FitModel, ModelFamily};

    fn fake_fit(model: FitModel, values: &[f64], errors: Option<&[f64]>, bins: usize) -> FitResult {
        let params = model
            .param_names()
            .into_iter()
            .enumerate()
            .map(|(i, name)| ParamEstimate {
                name,
                value: values[i],
                std_error: errors.map(|e| e[i]),
            })
            .collect();
        FitResult {
            model,
            params,
            curve: vec![0.0; bins],
            ssr: 0.0,
            iterations: 1,
        }
    }

    #[test]
    fn test_one_peak_layout() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        let mut table = ParameterTable::new(3, 10, PeakCount::One);
        let fit = fake_fit(
            model,
            &[10.0, 50.0, 5.0, 1.0],
            Some(&[0.1, 0.2, 0.3, 0.4]),
            10,
        );
        table.record_column(1, &fit).unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.width(), 6);
        assert_eq!(
            table.row(1).unwrap(),
            &[
                Some(10.0),
                Some(0.1),
                Some(50.0),
                Some(0.2),
                Some(5.0),
                Some(0.3)
            ]
        );
        assert_eq!(table.status(0), Some(&RowStatus::Pending));
        assert_eq!(table.status(1), Some(&RowStatus::Fitted));
        assert_eq!(table.column(CENTER).unwrap(), vec![None, Some(50.0), None]);
        assert!(!table.is_complete());
    }

    #[test]
    fn test_two_peak_blocks_in_order() {
        let model = FitModel::new(ModelFamily::Voigt, PeakCount::Two);
        let mut table = ParameterTable::new(1, 4, PeakCount::Two);
        let fit = fake_fit(
            model,
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0],
            None,
            4,
        );
        table.record_column(0, &fit).unwrap();

        assert_eq!(table.width(), 12);
        assert_eq!(table.value(0, ParamKind::Amplitude.offset(1)), Some(4.0));
        assert_eq!(table.value(0, ParamKind::Center.offset(1)), Some(5.0));
        assert_eq!(table.value(0, ParamKind::Width.offset(1)), Some(6.0));
        assert_eq!(table.value(0, ParamKind::Width.offset(0)), Some(3.0));
        // 协方差不可用：误差为空而非 0
        assert_eq!(table.value(0, ParamKind::Amplitude.error_offset(0)), None);
    }

    #[test]
    fn test_failure_overwrites_row() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::One);
        let mut table = ParameterTable::new(2, 5, PeakCount::One);
        let fit = fake_fit(model, &[1.0, 2.0, 3.0, 0.0], Some(&[0.0; 4]), 5);

        table.record_column(0, &fit).unwrap();
        table.record_column(1, &fit).unwrap();
        table.record_failure(0, "did not converge").unwrap();

        assert_eq!(table.row(0).unwrap(), &[None; 6]);
        assert!(table.fitted_curve(0).is_none());
        assert!(table.fitted_curve(1).is_some());
        assert_eq!(table.fitted_count(), 1);
        assert_eq!(table.failed_count(), 1);
        assert!(table.is_complete());
    }

    #[test]
    fn test_peak_count_mismatch_rejected() {
        let model = FitModel::new(ModelFamily::Gaussian, PeakCount::Two);
        let mut table = ParameterTable::new(1, 5, PeakCount::One);
        let fit = fake_fit(model, &[1.0; 7], None, 5);
        assert!(table.record_column(0, &fit).is_err());
        assert!(table.record_column(3, &fit).is_err());
    }
}
