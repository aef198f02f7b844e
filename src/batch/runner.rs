//! # 批量执行器
//!
//! 并行拟合多个扫描文件。每个文件内部的逐列扫描仍是顺序的，
//! 并行只发生在文件之间。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代
//! - 进度条显示
//! - 错误收集与汇总报告
//!
//! ## 依赖关系
//! - 被 `commands/fit.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::utils::progress;

use log::{debug, warn};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单个文件处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// 处理成功
    Success(String),
    /// 跳过（如结果已存在）
    Skipped(String),
    /// 处理失败
    Failed(String, String), // (文件路径, 错误信息)
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    /// 成功数量
    pub success: usize,
    /// 跳过数量
    pub skipped: usize,
    /// 失败数量
    pub failed: usize,
    /// 失败详情
    pub failures: Vec<(String, String)>,
}

impl BatchResult {
    /// 合并处理结果
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success(_) => self.success += 1,
            ProcessResult::Skipped(_) => self.skipped += 1,
            ProcessResult::Failed(path, err) => {
                self.failed += 1;
                self.failures.push((path, err));
            }
        }
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建新的批量执行器
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    /// 并行处理文件列表（结果顺序与输入一致）
    pub fn run<F>(&self, files: Vec<PathBuf>, processor: F) -> BatchResult
    where
        F: Fn(&PathBuf) -> ProcessResult + Sync + Send,
    {
        let total = files.len();
        let pb = progress::create_progress_bar(total as u64, "Fitting scans");
        let failed_count = AtomicUsize::new(0);

        let process = |file: &PathBuf| {
            let result = processor(file);
            match &result {
                ProcessResult::Success(msg) => debug!("{}", msg),
                ProcessResult::Skipped(msg) => debug!("skipped: {}", msg),
                ProcessResult::Failed(path, err) => {
                    failed_count.fetch_add(1, Ordering::Relaxed);
                    warn!("{} failed: {}", path, err);
                }
            }
            pb.inc(1);
            pb.set_message(format!(
                "Fitting scans ({} failed)",
                failed_count.load(Ordering::Relaxed)
            ));
            result
        };

        // 线程池创建失败时退回全局池
        let results: Vec<ProcessResult> =
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => pool.install(|| files.par_iter().map(process).collect()),
                Err(e) => {
                    warn!("could not build a {}-thread pool: {}", self.jobs, e);
                    files.par_iter().map(process).collect()
                }
            };

        pb.finish_and_clear();

        // 汇总结果
        let mut batch_result = BatchResult::default();
        for result in results {
            batch_result.merge(result);
        }

        batch_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_merge() {
        let mut result = BatchResult::default();
        result.merge(ProcessResult::Success("a".to_string()));
        result.merge(ProcessResult::Skipped("b".to_string()));
        result.merge(ProcessResult::Failed("c".to_string(), "bad".to_string()));
        assert_eq!(result.total(), 3);
        assert_eq!(result.failures, vec![("c".to_string(), "bad".to_string())]);
    }

    #[test]
    fn test_run_counts_outcomes() {
        let files: Vec<PathBuf> = (0..6).map(|i| PathBuf::from(format!("{}.dat", i))).collect();
        let result = BatchRunner::new(2).run(files, |file| {
            let name = file.display().to_string();
            if name.starts_with('0') {
                ProcessResult::Failed(name, "empty".to_string())
            } else if name.starts_with('1') {
                ProcessResult::Skipped(name)
            } else {
                ProcessResult::Success(name)
            }
        });
        assert_eq!(result.success, 4);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 1);
    }
}
