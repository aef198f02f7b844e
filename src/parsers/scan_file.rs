//! # 扫描数据文件解析器
//!
//! 解析纯文本扫描文件，得到头部元数据与强度矩阵。
//!
//! ## 文件格式
//! ```text
//! # l_min = 1.2
//! # l_max: 3.4
//! # l_element = 6.28
//! # voltage = 5.0
//! 12.0  15.1  13.7  ...     <- 第 0 个 bin，每列一个扫描
//! 14.2  18.3  16.0  ...
//! ```
//!
//! 以 `#` 开头的行为头部；键名不区分大小写，`=` 或 `:` 分隔。
//! 其余非空行为一个 bin，空白分隔的浮点数，各行列数必须一致。
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs`, `commands/inspect.rs` 使用
//! - 使用 `models/scan.rs`, `models/instrument.rs`

use crate::error::{Result, ScanFitError};
use crate::models::{ScanHeader, ScanMatrix};
use regex::Regex;
use std::fs;
use std::path::Path;

/// 解析后的扫描文件
#[derive(Debug, Clone)]
pub struct ScanFile {
    /// 文件名（不含扩展名）
    pub name: String,
    pub header: ScanHeader,
    pub matrix: ScanMatrix,
}

/// 解析扫描文件
pub fn parse_scan_file(path: &Path) -> Result<ScanFile> {
    if !path.exists() {
        return Err(ScanFitError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| ScanFitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    parse_scan_content(&content, name).map_err(|e| match e {
        // 补上真实路径
        ScanFitError::ParseError { reason, .. } => ScanFitError::ParseError {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// 从字符串内容解析扫描文件
pub fn parse_scan_content(content: &str, name: &str) -> Result<ScanFile> {
    let parse_error = |reason: String| ScanFitError::ParseError {
        path: name.to_string(),
        reason,
    };

    // "# l_min = 1.2" / "# Voltage: 5"
    let key_value = Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_ ]*?)\s*[=:]\s*(\S+)")
        .map_err(|e| parse_error(format!("invalid header pattern: {}", e)))?;

    let mut header = ScanHeader::default();
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(text) = line.strip_prefix('#') {
            let text = text.trim();
            if let Some(caps) = key_value.captures(text) {
                let key = caps[1].trim().to_lowercase().replace(' ', "_");
                let value = caps[2].parse::<f64>().ok();
                match key.as_str() {
                    "l_min" | "lmin" => header.l_min = value,
                    "l_max" | "lmax" => header.l_max = value,
                    "l_element" | "lattice_element" | "lelement" => {
                        header.lattice_element = value
                    }
                    "voltage" | "peak_voltage" => header.voltage = value,
                    _ => {}
                }
            }
            header.lines.push(text.to_string());
            continue;
        }

        let row = line
            .split_whitespace()
            .map(|cell| {
                cell.parse::<f64>().map_err(|_| {
                    parse_error(format!(
                        "line {}: '{}' is not a number",
                        line_no + 1,
                        cell
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(parse_error(format!(
                    "line {}: expected {} columns, found {}",
                    line_no + 1,
                    first.len(),
                    row.len()
                )));
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(parse_error("no data rows".to_string()));
    }

    let matrix = ScanMatrix::from_rows(rows)?;

    Ok(ScanFile {
        name: name.to_string(),
        header,
        matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanSource;

    const SAMPLE: &str = "\
# scan 12
# L_Min = 1.5
# l_max: 2.5
# l_element = 6.0
# Voltage = 4
1.0 2.0 3.0
4.0 5.0 6.0

7.0 8.0 9.0
";

    #[test]
    fn test_parse_header_and_matrix() {
        let scan = parse_scan_content(SAMPLE, "scan12").unwrap();

        assert_eq!(scan.name, "scan12");
        assert_eq!(scan.header.l_min, Some(1.5));
        assert_eq!(scan.header.l_max, Some(2.5));
        assert_eq!(scan.header.lattice_element, Some(6.0));
        assert_eq!(scan.header.voltage, Some(4.0));
        assert_eq!(scan.header.lines.len(), 5);
        assert!(scan.header.unit_params().is_some());

        assert_eq!(scan.matrix.row_count(), 3);
        assert_eq!(scan.matrix.column_count(), 3);
        assert_eq!(scan.matrix.column(1), vec![2.0, 5.0, 8.0]);
    }

    #[test]
    fn test_missing_metadata_is_none() {
        let scan = parse_scan_content("1 2\n3 4\n", "bare").unwrap();
        assert_eq!(scan.header, ScanHeader::default());
        assert!(scan.header.unit_params().is_none());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = parse_scan_content("1 2 3\n4 5\n", "ragged").unwrap_err();
        assert!(matches!(err, ScanFitError::ParseError { .. }));
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let err = parse_scan_content("1 2\n3 x\n", "bad").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(parse_scan_content("# only header\n", "empty").is_err());
    }
}
