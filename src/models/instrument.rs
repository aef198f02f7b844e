//! # 仪器元数据模型
//!
//! 由扫描文件头部解析得到的仪器参数，用于把 bin 位置换算为晶格单位，
//! 以及重建电压扫描轴。
//!
//! ## 依赖关系
//! - 被 `parsers/scan_file.rs` 填充
//! - 被 `fit/derived.rs` 使用

use serde::{Deserialize, Serialize};

/// 晶格单位换算参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalUnitParams {
    /// L 范围下限
    pub l_min: f64,
    /// L 范围上限
    pub l_max: f64,
    /// 晶格常数
    pub lattice_element: f64,
}

/// 扫描文件头部元数据，所有字段可选
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanHeader {
    pub l_min: Option<f64>,
    pub l_max: Option<f64>,
    pub lattice_element: Option<f64>,
    /// 峰值电压
    pub voltage: Option<f64>,
    /// 原始头部行（去掉 `#`）
    pub lines: Vec<String>,
}

impl ScanHeader {
    /// 三个换算参数齐全时返回
    pub fn unit_params(&self) -> Option<PhysicalUnitParams> {
        match (self.l_min, self.l_max, self.lattice_element) {
            (Some(l_min), Some(l_max), Some(lattice_element)) => Some(PhysicalUnitParams {
                l_min,
                l_max,
                lattice_element,
            }),
            _ => None,
        }
    }
}
