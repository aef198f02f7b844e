//! # inspect 子命令实现
//!
//! 打印扫描文件的矩阵尺寸、头部元数据，以及可用的派生轴。
//!
//! ## 依赖关系
//! - 使用 `cli/inspect.rs` 定义的 InspectArgs
//! - 使用 `scanfit::parsers` 读取扫描文件

use crate::cli::inspect::InspectArgs;
use crate::utils::output;

use scanfit::error::Result;
use scanfit::fit;
use scanfit::models::ScanSource;
use scanfit::parsers;

use tabled::{Table, Tabled};

/// 执行 inspect
pub fn execute(args: InspectArgs) -> Result<()> {
    output::print_header("Scan File Summary");

    let scan = parsers::parse_scan_file(&args.input)?;
    let header = &scan.header;

    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "Field")]
        field: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let show = |v: Option<f64>| v.map(|v| format!("{}", v)).unwrap_or_else(|| "-".to_string());

    let rows = vec![
        FieldRow {
            field: "Name",
            value: scan.name.clone(),
        },
        FieldRow {
            field: "Bins (rows)",
            value: scan.matrix.row_count().to_string(),
        },
        FieldRow {
            field: "Scans (columns)",
            value: scan.matrix.column_count().to_string(),
        },
        FieldRow {
            field: "l_min",
            value: show(header.l_min),
        },
        FieldRow {
            field: "l_max",
            value: show(header.l_max),
        },
        FieldRow {
            field: "l_element",
            value: show(header.lattice_element),
        },
        FieldRow {
            field: "Voltage",
            value: show(header.voltage),
        },
    ];
    println!("{}", Table::new(&rows));

    if header.unit_params().is_some() {
        output::print_success("Lattice conversion available");
    } else {
        output::print_warning("Lattice conversion unavailable (need l_min, l_max, l_element)");
    }

    if let Some(voltage) = header.voltage {
        match fit::voltage_sweep(voltage, scan.matrix.column_count()) {
            Ok(axis) => output::print_info(&format!(
                "Voltage axis: {:.3} .. {:.3} ({} points)",
                axis.iter().copied().fold(f64::INFINITY, f64::min),
                axis.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                axis.len()
            )),
            Err(e) => output::print_warning(&format!("Voltage axis unavailable: {}", e)),
        }
    }

    if args.header && !header.lines.is_empty() {
        output::print_separator();
        for line in &header.lines {
            println!("  # {}", line);
        }
    }

    Ok(())
}
