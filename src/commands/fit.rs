//! # fit 子命令实现
//!
//! 读取扫描文件，逐列拟合，导出参数表、拟合曲线和派生序列，
//! 并生成诊断图与汇总图。
//!
//! ## 功能
//! - 支持单文件和批量目录处理
//! - 批量模式文件间并行（rayon），单个文件内逐列顺序拟合
//! - `--each-fit N`：只为前 N 列生成单列诊断图
//! - 横轴优先使用电压扫描轴，缺少电压时使用列索引
//!
//! ## 输出目录结构
//! ```text
//! <output>/<scan>/
//!   parameters.csv    curves.csv
//!   p1_amplitude.csv  p1_position.csv  p1_width.csv  p1_amplitude_x_width.csv
//!   p1_lattice.csv    p1_lattice_pct_change.csv      (需要晶格换算参数)
//!   *.png / *.svg     fits/column_000.png ...
//! ```
//!
//! ## 依赖关系
//! - 使用 `cli/fit.rs` 定义的 FitArgs
//! - 使用 `batch/` 模块进行批量处理
//! - 使用 `scanfit` 库完成解析、拟合、导出与绘图

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::fit::FitArgs;
use crate::utils::{output, progress};

use scanfit::error::{Result, ScanFitError};
use scanfit::fit::{
    self, ColumnDecision, ColumnDriver, DerivedSeries, ParamKind, ParameterTable, Propagation,
    RowStatus, SolverOptions,
};
use scanfit::models::{PhysicalUnitParams, ScanHeader, ScanSource, SessionConfig};
use scanfit::parsers::{self, ScanFile};
use scanfit::plot::{self, PlotFormat, PlotStyle, SeriesLabels};
use scanfit::export;

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};

/// 执行峰拟合
pub fn execute(args: FitArgs) -> Result<()> {
    output::print_header("Scan Peak Fitting");

    let job = Arc::new(FitJob::from_args(&args));
    output::print_info(&format!("Model: {}", job.session.model()));
    if job.session.user_guess.is_some() {
        output::print_info("Initial guess: user supplied (shared by all columns)");
    } else {
        output::print_info("Initial guess: moment estimate per column");
    }

    if args.input.is_file() {
        execute_single_file(&args, &job)
    } else if args.input.is_dir() {
        execute_batch(&args, &job)
    } else {
        Err(ScanFitError::FileNotFound {
            path: args.input.display().to_string(),
        })
    }
}

/// 拟合任务配置（批量模式下在线程间共享）
struct FitJob {
    output_dir: PathBuf,
    session: SessionConfig,
    solver: SolverOptions,
    l_min: Option<f64>,
    l_max: Option<f64>,
    lattice_element: Option<f64>,
    voltage: Option<f64>,
    plot_format: Option<PlotFormat>,
    each_fit: usize,
    propagation: Propagation,
    overwrite: bool,
}

impl FitJob {
    fn from_args(args: &FitArgs) -> Self {
        Self {
            output_dir: args.output.clone(),
            session: args.session(),
            solver: SolverOptions {
                max_iterations: args.max_iterations,
                ..SolverOptions::default()
            },
            l_min: args.l_min,
            l_max: args.l_max,
            lattice_element: args.lattice_element,
            voltage: args.voltage,
            plot_format: args.plot_format.to_format(),
            each_fit: args.each_fit,
            propagation: if args.quadrature {
                Propagation::Quadrature
            } else {
                Propagation::Linear
            },
            overwrite: args.overwrite,
        }
    }

    /// 命令行参数覆盖文件头
    fn unit_params(&self, header: &ScanHeader) -> Option<PhysicalUnitParams> {
        Some(PhysicalUnitParams {
            l_min: self.l_min.or(header.l_min)?,
            l_max: self.l_max.or(header.l_max)?,
            lattice_element: self.lattice_element.or(header.lattice_element)?,
        })
    }

    fn plot_style(&self) -> Option<PlotStyle> {
        self.plot_format.map(|format| PlotStyle {
            format,
            ..PlotStyle::default()
        })
    }
}

/// 单个扫描文件的拟合结果
struct ScanOutcome {
    table: ParameterTable,
    output_dir: PathBuf,
    warnings: Vec<String>,
}

/// 单文件模式
fn execute_single_file(args: &FitArgs, job: &FitJob) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", args.input.display()));

    let scan = parsers::parse_scan_file(&args.input)?;
    output::print_success(&format!(
        "Loaded scan '{}': {} bins x {} columns",
        scan.name,
        scan.matrix.row_count(),
        scan.matrix.column_count()
    ));

    let target = job.output_dir.join(&scan.name);
    if target.join("parameters.csv").exists() && !job.overwrite {
        output::print_warning(&format!(
            "Output exists, skipping: {} (use --overwrite)",
            target.display()
        ));
        return Ok(());
    }

    let spinner = progress::create_spinner(&format!(
        "Fitting {} columns",
        scan.matrix.column_count()
    ));
    let outcome = process_scan(&scan, job);
    spinner.finish_and_clear();
    let outcome = outcome?;

    for warning in &outcome.warnings {
        output::print_warning(warning);
    }

    print_parameter_table(&outcome.table);

    if outcome.table.failed_count() > 0 {
        output::print_warning(&format!(
            "{} of {} columns could not be fitted",
            outcome.table.failed_count(),
            outcome.table.row_count()
        ));
    }
    output::print_success(&format!(
        "Results written to '{}'",
        outcome.output_dir.display()
    ));

    Ok(())
}

/// 批量处理模式
fn execute_batch(args: &FitArgs, job: &Arc<FitJob>) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", args.input.display()));

    let collector = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive);

    let files = collector.collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No matching files found with pattern '{}'",
            args.pattern
        ));
        return Ok(());
    }

    output::print_info(&format!("Found {} scan files", files.len()));

    fs::create_dir_all(&job.output_dir).map_err(|e| ScanFitError::FileWriteError {
        path: job.output_dir.display().to_string(),
        source: e,
    })?;

    let runner = BatchRunner::new(args.jobs);
    let result = runner.run(files, |file| process_batch_file(file, job));

    output::print_separator();
    output::print_success(&format!(
        "Batch complete: {} success, {} skipped, {} failed",
        result.success, result.skipped, result.failed
    ));

    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > 10 {
            output::print_warning(&format!("  ... and {} more", result.failures.len() - 10));
        }
    }

    Ok(())
}

/// 处理批量模式中的单个文件
fn process_batch_file(input: &Path, job: &FitJob) -> ProcessResult {
    let scan = match parsers::parse_scan_file(input) {
        Ok(scan) => scan,
        Err(e) => return ProcessResult::Failed(input.display().to_string(), e.to_string()),
    };

    let target = job.output_dir.join(&scan.name);
    if target.join("parameters.csv").exists() && !job.overwrite {
        return ProcessResult::Skipped(format!("Output exists, skipping: {}", target.display()));
    }

    match process_scan(&scan, job) {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                warn!("{}: {}", scan.name, warning);
            }
            ProcessResult::Success(format!(
                "{}: {}/{} columns fitted -> {}",
                input.display(),
                outcome.table.fitted_count(),
                outcome.table.row_count(),
                outcome.output_dir.display()
            ))
        }
        Err(e) => ProcessResult::Failed(
            input.display().to_string(),
            format!("{} ({})", e, e.class()),
        ),
    }
}

/// 拟合一个扫描文件并写出所有结果
fn process_scan(scan: &ScanFile, job: &FitJob) -> Result<ScanOutcome> {
    let out_dir = job.output_dir.join(&scan.name);
    create_dir(&out_dir)?;

    let style = job.plot_style();
    let driver = ColumnDriver::new(job.solver);
    let mut warnings = Vec::new();

    let table = match style.filter(|_| job.each_fit > 0) {
        Some(column_style) => {
            let (table, rendered) = sweep_with_column_plots(
                &driver,
                scan,
                job,
                &out_dir.join("fits"),
                column_style,
                &mut warnings,
            )?;
            debug!("{}: {} per-column plots rendered", scan.name, rendered);
            table
        }
        None => driver.run_fit(&scan.matrix, &job.session)?,
    };

    let (axis, axis_desc) = summary_axis(scan, job, &mut warnings);
    let unit_params = job.unit_params(&scan.header);
    if unit_params.is_none() {
        warnings.push(
            "Lattice parameters (l_min, l_max, l_element) missing; lattice series skipped"
                .to_string(),
        );
    }

    let mut outputs: Vec<(String, SeriesLabels, DerivedSeries)> = Vec::new();
    for peak in 0..table.peaks().get() {
        let prefix = format!("p{}", peak + 1);

        for kind in [ParamKind::Amplitude, ParamKind::Center, ParamKind::Width] {
            let (values, errors) = table.series(peak, kind)?;
            outputs.push((
                format!("{}_{}", prefix, kind.label().to_lowercase()),
                labels(kind.label(), peak, &axis_desc, kind.label()),
                DerivedSeries {
                    values,
                    errors: Some(errors),
                },
            ));
        }

        outputs.push((
            format!("{}_amplitude_x_width", prefix),
            labels("Amplitude x Width", peak, &axis_desc, "A x W"),
            fit::amplitude_times_width(&table, peak, job.propagation)?,
        ));

        if let Some(params) = &unit_params {
            let lattice = match fit::lattice_positions(&table, peak, params) {
                Ok(lattice) => lattice,
                Err(e) => {
                    warnings.push(format!("Peak {} lattice series skipped: {}", peak + 1, e));
                    continue;
                }
            };
            match fit::percent_change(&lattice) {
                Ok(change) => outputs.push((
                    format!("{}_lattice_pct_change", prefix),
                    labels("RLU %-Change", peak, &axis_desc, "%-Change"),
                    change,
                )),
                Err(e) => {
                    warnings.push(format!("Peak {} lattice %-change skipped: {}", peak + 1, e))
                }
            }
            outputs.push((
                format!("{}_lattice", prefix),
                labels("L Fit - Position", peak, &axis_desc, "RLU"),
                lattice,
            ));
        }
    }

    export::curves_to_csv(&table, &out_dir.join("curves.csv"))?;
    for (name, series_labels, series) in &outputs {
        export::series_to_csv(series, &axis, &out_dir.join(format!("{}.csv", name)))?;
        if let Some(style) = style {
            let path = out_dir.join(format!("{}.{}", name, style.format.extension()));
            if let Err(e) = plot::plot_series(&axis, series, series_labels, &path, style) {
                warnings.push(format!("Plot '{}' skipped: {}", series_labels.title, e));
            }
        }
    }
    // parameters.csv 最后写出，存在即表示该扫描已完整处理
    export::table_to_csv(&table, &out_dir.join("parameters.csv"))?;

    Ok(ScanOutcome {
        table,
        output_dir: out_dir,
        warnings,
    })
}

/// 逐列拟合，并为前 `each_fit` 列生成诊断图，返回参数表与成功生成的图数
fn sweep_with_column_plots(
    driver: &ColumnDriver,
    scan: &ScanFile,
    job: &FitJob,
    fits_dir: &Path,
    style: PlotStyle,
    warnings: &mut Vec<String>,
) -> Result<(ParameterTable, usize)> {
    create_dir(fits_dir)?;

    let family = job.session.model_family;
    let mut plot_failure: Option<ScanFitError> = None;
    let mut rendered = 0usize;

    let report = driver.run_sweep(&scan.matrix, &job.session, |column| {
        let path = fits_dir.join(format!(
            "column_{:03}.{}",
            column.index,
            style.format.extension()
        ));
        let curve = column.fit.result().map(|fit| fit.curve.as_slice());
        match plot::plot_column_fit(column.xx, column.yy, curve, family, &path, style) {
            Ok(()) => rendered += 1,
            Err(e) => {
                plot_failure.get_or_insert(e);
            }
        }
        if column.index + 1 >= job.each_fit {
            ColumnDecision::SkipRemaining
        } else {
            ColumnDecision::Proceed
        }
    })?;

    if let Some(e) = plot_failure {
        warnings.push(format!("Per-column plots incomplete: {}", e));
    }
    Ok((report.table, rendered))
}

/// 汇总图横轴：电压扫描轴，否则列索引
fn summary_axis(scan: &ScanFile, job: &FitJob, warnings: &mut Vec<String>) -> (Vec<f64>, String) {
    let n_cols = scan.matrix.column_count();
    let index_axis = || (0..n_cols).map(|j| j as f64).collect::<Vec<_>>();

    match job.voltage.or(scan.header.voltage) {
        Some(voltage) => match fit::voltage_sweep(voltage, n_cols) {
            Ok(axis) => (axis, "Voltage".to_string()),
            Err(e) => {
                warnings.push(format!("Voltage axis unavailable ({}); using column index", e));
                (index_axis(), "Column".to_string())
            }
        },
        None => (index_axis(), "Column".to_string()),
    }
}

fn labels(title: &str, peak: usize, x_desc: &str, y_desc: &str) -> SeriesLabels {
    SeriesLabels {
        title: format!("{} #{}", title, peak + 1),
        x_desc: x_desc.to_string(),
        y_desc: y_desc.to_string(),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| ScanFitError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 打印参数表
fn print_parameter_table(table: &ParameterTable) {
    #[derive(Tabled)]
    struct ParamRow {
        #[tabled(rename = "Column")]
        column: usize,
        #[tabled(rename = "Peak")]
        peak: usize,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Amplitude")]
        amplitude: String,
        #[tabled(rename = "Center")]
        center: String,
        #[tabled(rename = "Width")]
        width: String,
    }

    let cell = |row: usize, peak: usize, kind: ParamKind| -> String {
        match (
            table.value(row, kind.offset(peak)),
            table.value(row, kind.error_offset(peak)),
        ) {
            (Some(v), Some(e)) => format!("{:.4} ± {:.4}", v, e),
            (Some(v), None) => format!("{:.4} ± n/a", v),
            _ => "-".to_string(),
        }
    };

    let rows: Vec<ParamRow> = (0..table.row_count())
        .flat_map(|row| (0..table.peaks().get()).map(move |peak| (row, peak)))
        .map(|(row, peak)| ParamRow {
            column: row,
            peak: peak + 1,
            status: match table.status(row) {
                Some(RowStatus::Failed(reason)) => format!("failed: {}", truncate(reason, 40)),
                Some(status) => status.to_string(),
                None => String::new(),
            },
            amplitude: cell(row, peak, ParamKind::Amplitude),
            center: cell(row, peak, ParamKind::Center),
            width: cell(row, peak, ParamKind::Width),
        })
        .collect();

    if !rows.is_empty() {
        output::print_header(&format!(
            "Fit Parameters ({} of {} columns fitted)",
            table.fitted_count(),
            table.row_count()
        ));
        println!("{}", Table::new(&rows));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    use scanfit::fit::shapes;
    use scanfit::models::{ModelFamily, PeakCount};
    use tempfile::tempdir;

    fn gaussian_job(output_dir: PathBuf) -> FitJob {
        FitJob {
            output_dir,
            session: SessionConfig::new(ModelFamily::Gaussian, PeakCount::One),
            solver: SolverOptions::default(),
            l_min: None,
            l_max: None,
            lattice_element: None,
            voltage: None,
            plot_format: None,
            each_fit: 0,
            propagation: Propagation::Linear,
            overwrite: false,
        }
    }

    fn gaussian_scan(header: &str) -> ScanFile {
        let mut content = header.to_string();
        for i in 0..100 {
            let x = i as f64;
            content.push_str(&format!(
                "{:.12} {:.12}\n",
                shapes::gaussian1(x, 10.0, 50.0, 5.0, 1.0),
                shapes::gaussian1(x, 20.0, 40.0, 8.0, 2.0)
            ));
        }
        parsers::parse_scan_content(&content, "scan").unwrap()
    }

    #[test]
    fn test_lattice_failure_keeps_outputs_complete() {
        let dir = tempdir().unwrap();
        let job = gaussian_job(dir.path().to_path_buf());
        // L 恒为 0，晶格换算不可用
        let scan = gaussian_scan("# l_min = 0\n# l_max = 0\n# l_element = 6\n");

        let outcome = process_scan(&scan, &job).unwrap();
        let out = dir.path().join("scan");

        assert!(out.join("parameters.csv").exists());
        assert!(out.join("curves.csv").exists());
        assert!(out.join("p1_amplitude_x_width.csv").exists());
        assert!(!out.join("p1_lattice.csv").exists());
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("lattice series skipped")));
        assert_eq!(outcome.table.fitted_count(), 2);
    }

    #[test]
    fn test_no_column_plots_without_each_fit() {
        let dir = tempdir().unwrap();
        let mut job = gaussian_job(dir.path().to_path_buf());
        job.plot_format = Some(PlotFormat::Svg);
        let scan = gaussian_scan("");

        let outcome = process_scan(&scan, &job).unwrap();
        assert!(!dir.path().join("scan").join("fits").exists());
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("Lattice parameters")));
    }

    #[test]
    fn test_unit_params_override_header() {
        let mut job = gaussian_job(PathBuf::from("out"));
        job.l_min = Some(0.5);
        let header = ScanHeader {
            l_min: Some(1.0),
            l_max: Some(2.0),
            lattice_element: Some(6.0),
            ..ScanHeader::default()
        };
        let params = job.unit_params(&header).unwrap();
        assert_eq!(params.l_min, 0.5);
        assert_eq!(params.l_max, 2.0);

        assert!(job.unit_params(&ScanHeader::default()).is_none());
    }
}
