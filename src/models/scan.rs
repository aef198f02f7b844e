//! # 扫描矩阵数据模型
//!
//! 扫描数据为二维强度表：行 = bin 索引，列 = 扫描索引。
//! 拟合核心只读取该矩阵，从不修改。
//!
//! ## 依赖关系
//! - 被 `parsers/scan_file.rs` 构造
//! - 被 `fit/driver.rs` 逐列读取

use crate::error::{Result, ScanFitError};

/// 扫描数据源（由外部数据加载方提供）
pub trait ScanSource {
    /// bin 数量 (nRow)
    fn row_count(&self) -> usize;

    /// 扫描数量 (nCol)
    fn column_count(&self) -> usize;

    /// 取出第 `j` 列强度
    fn column(&self, j: usize) -> Vec<f64>;
}

/// 不可变的扫描矩阵（行主序存储）
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl ScanMatrix {
    /// 从行数据构造，每行长度必须一致
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);

        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(ScanFitError::precondition(
                "scan matrix",
                format!("row {} has {} values, expected {}", i, row.len(), n_cols),
            ));
        }

        Ok(Self {
            n_rows,
            n_cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// 从列数据构造，每列长度必须一致
    pub fn from_columns(columns: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = columns.len();
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);

        if let Some((j, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_rows) {
            return Err(ScanFitError::precondition(
                "scan matrix",
                format!("column {} has {} values, expected {}", j, col.len(), n_rows),
            ));
        }

        let mut data = vec![0.0; n_rows * n_cols];
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                data[i * n_cols + j] = *v;
            }
        }

        Ok(Self {
            n_rows,
            n_cols,
            data,
        })
    }
}

impl ScanSource for ScanMatrix {
    fn row_count(&self) -> usize {
        self.n_rows
    }

    fn column_count(&self) -> usize {
        self.n_cols
    }

    fn column(&self, j: usize) -> Vec<f64> {
        if j >= self.n_cols {
            return Vec::new();
        }
        self.data
            .iter()
            .skip(j)
            .step_by(self.n_cols)
            .copied()
            .collect()
    }
}

/// bin 位置轴，长度 = nRow
#[derive(Debug, Clone, PartialEq)]
pub struct BinAxis(Vec<f64>);

impl BinAxis {
    /// 整数 bin 索引 `0..n`
    pub fn indices(n: usize) -> Self {
        BinAxis((0..n).map(|i| i as f64).collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}
