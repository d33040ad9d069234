//! 批处理驱动
//!
//! 状态机：INIT → (PROCESS_FILE)* → FINALIZE。
//!
//! - INIT：输入文件按文件名字典序（正序）排列，并为每个文件分配不冲突的输出名
//! - PROCESS_FILE：运行单图像流水线，把图像与测量表交给持久化器，追加一行汇总
//! - FINALIZE：保存汇总表；行数严格等于成功处理的文件数
//!
//! 并行模式下各文件互不共享可变状态，结果按文件下标重排后再追加，
//! 保证汇总表顺序与串行模式一致。单个文件失败只记录并跳过，不中止批处理。

use super::aggregator::{BatchSummaryRow, BatchSummaryTable, DateTag};
use super::batch_state::{BatchStatsSnapshot, CancelToken, ParallelBatchStats, SerialBatchStats};
use super::persister::{OutputSlot, ResultPersister};
use super::pipeline::{AnalysisConfig, PipelineContext};
use crate::error::{ErrorCategory, QuantError, QuantResult};
use crate::image::{ChannelPairLoader, file_id};
use crate::tools::constants::{layout, parallel_limits};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Serial,
    /// 文件级并行（并发度会被限制在 1..=16）
    Parallel(usize),
}

/// 批处理结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub table: BatchSummaryTable,
    pub stats: BatchStatsSnapshot,
    /// 输入文件总数
    pub total_files: usize,
    /// 是否在文件之间被取消
    pub cancelled: bool,
}

/// 有序结果容器（保证汇总顺序）
struct OrderedResult {
    /// 原始文件下标（用于排序）
    index: usize,
    /// 被取消的文件返回 `QuantError::Cancelled`
    result: QuantResult<BatchSummaryRow>,
}

/// 一个待处理的输入文件
#[derive(Debug, Clone)]
struct BatchItem {
    path: PathBuf,
    /// 输出文件名（文件标识，重名时追加序号）
    output_name: String,
}

/// 批处理驱动
pub struct BatchDriver<'a> {
    config: &'a AnalysisConfig,
    date: &'a DateTag,
    loader: &'a dyn ChannelPairLoader,
    persister: &'a dyn ResultPersister,
    mode: ExecutionMode,
    cancel: CancelToken,
}

impl<'a> BatchDriver<'a> {
    pub fn new(
        config: &'a AnalysisConfig,
        date: &'a DateTag,
        loader: &'a dyn ChannelPairLoader,
        persister: &'a dyn ResultPersister,
    ) -> Self {
        Self {
            config,
            date,
            loader,
            persister,
            mode: ExecutionMode::Serial,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 汇总表的文件名（不含扩展名）
    pub fn summary_name(&self) -> String {
        format!("{}{}", self.date.as_str(), layout::SUMMARY_SUFFIX)
    }

    /// 运行整个批处理
    pub fn run(self, files: &[PathBuf]) -> QuantResult<BatchOutcome> {
        let items = self.init(files);
        let total_files = items.len();

        let (rows, stats, cancelled) = match self.mode {
            ExecutionMode::Parallel(degree) => {
                let degree = degree.clamp(
                    parallel_limits::MIN_PARALLEL_DEGREE,
                    parallel_limits::MAX_PARALLEL_DEGREE,
                );
                if degree > 1 && items.len() > 1 {
                    self.process_parallel(&items, degree)?
                } else {
                    self.process_serial(&items)
                }
            }
            ExecutionMode::Serial => self.process_serial(&items),
        };

        self.finalize(rows, stats, total_files, cancelled)
    }

    /// INIT：正序字典序 + 输出名去重
    ///
    /// 每个文件标识第一次出现时保留原名；重复的标识追加 `_N`，
    /// N 从2递增，跳过已分配的名字和其他文件的真实标识。
    fn init(&self, files: &[PathBuf]) -> Vec<BatchItem> {
        let mut sorted: Vec<PathBuf> = files.to_vec();
        sorted.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

        let ids: Vec<String> = sorted.iter().map(|path| file_id(path)).collect();
        let reserved: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut assigned: HashSet<String> = HashSet::with_capacity(ids.len());

        let items: Vec<BatchItem> = sorted
            .into_iter()
            .zip(ids.iter())
            .map(|(path, id)| {
                let output_name = if assigned.contains(id) {
                    (2usize..)
                        .map(|n| format!("{id}_{n}"))
                        .find(|name| !assigned.contains(name) && !reserved.contains(name.as_str()))
                        .unwrap_or_else(|| id.clone())
                } else {
                    id.clone()
                };
                assigned.insert(output_name.clone());
                BatchItem { path, output_name }
            })
            .collect();

        log::info!("批处理初始化 / Batch init: {} 个文件 / files", items.len());
        items
    }

    fn process_serial(
        &self,
        items: &[BatchItem],
    ) -> (Vec<BatchSummaryRow>, BatchStatsSnapshot, bool) {
        let mut stats = SerialBatchStats::new();
        let mut rows = Vec::with_capacity(items.len());
        let mut cancelled = false;

        for (index, item) in items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            log::info!(
                "[{}/{}] 处理 / Processing: {}",
                index + 1,
                items.len(),
                item.path.display()
            );

            match self.process_file(&item.path, &item.output_name) {
                Ok(row) => {
                    stats.inc_processed();
                    rows.push(row);
                }
                Err(e) => {
                    report_failure(item, &e);
                    stats.inc_failed(
                        ErrorCategory::from_quant_error(&e),
                        item.output_name.clone(),
                    );
                }
            }
        }

        (rows, stats.snapshot(), cancelled)
    }

    fn process_parallel(
        &self,
        items: &[BatchItem],
        degree: usize,
    ) -> QuantResult<(Vec<BatchSummaryRow>, BatchStatsSnapshot, bool)> {
        log::info!("启用多文件并行处理 / Parallel processing: {degree} 并发度 / workers");

        let stats = ParallelBatchStats::new();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(degree)
            .thread_name(|i| format!("quant-worker-{i}"))
            .build()
            .map_err(|e| QuantError::ResourceError(format!("线程池创建失败: {e}")))?;

        let mut results: Vec<OrderedResult> = pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(index, item)| {
                    if self.cancel.is_cancelled() {
                        return OrderedResult {
                            index,
                            result: Err(QuantError::Cancelled),
                        };
                    }

                    let result = self.process_file(&item.path, &item.output_name);
                    match &result {
                        Ok(_) => {
                            stats.inc_processed();
                        }
                        Err(e) => {
                            report_failure(item, e);
                            stats.inc_failed(
                                ErrorCategory::from_quant_error(e),
                                item.output_name.clone(),
                            );
                        }
                    }

                    OrderedResult { index, result }
                })
                .collect()
        });

        // 按原始顺序排序结果（保证汇总顺序）
        results.sort_by_key(|r| r.index);

        let cancelled = results
            .iter()
            .any(|r| matches!(r.result, Err(QuantError::Cancelled)));
        let rows = results.into_iter().filter_map(|r| r.result.ok()).collect();

        Ok((rows, stats.snapshot(), cancelled))
    }

    /// PROCESS_FILE：加载 → 流水线 → 持久化 → 汇总行
    fn process_file(&self, path: &Path, output_name: &str) -> QuantResult<BatchSummaryRow> {
        let pair = self.loader.load(path)?;
        let analysis = PipelineContext::new(self.config, self.date, output_name).run(&pair)?;

        let mask_image = analysis.mask.to_image(pair.pixel_size_microns())?;
        self.persister
            .save_table(&analysis.report.to_table(), OutputSlot::ImageTable, output_name)?;
        self.persister
            .save_image(pair.fluorescence(), OutputSlot::Fluorescence, output_name)?;
        self.persister
            .save_image(pair.reference(), OutputSlot::Reference, output_name)?;
        self.persister
            .save_image(&mask_image, OutputSlot::Drawing, output_name)?;

        Ok(analysis.report.summary_row())
    }

    /// FINALIZE：组装并保存汇总表
    fn finalize(
        self,
        rows: Vec<BatchSummaryRow>,
        stats: BatchStatsSnapshot,
        total_files: usize,
        cancelled: bool,
    ) -> QuantResult<BatchOutcome> {
        let mut table = BatchSummaryTable::new();
        for row in rows {
            table.push(row);
        }

        if cancelled {
            log::warn!(
                "批处理已取消，保留已完成的 {} 行 / Batch cancelled, keeping {} completed rows",
                table.len(),
                table.len()
            );
        }

        self.persister
            .save_table(&table.to_table(), OutputSlot::Summary, &self.summary_name())?;

        Ok(BatchOutcome {
            table,
            stats,
            total_files,
            cancelled,
        })
    }
}

fn report_failure(item: &BatchItem, error: &QuantError) {
    let category = ErrorCategory::from_quant_error(error);
    log::warn!(
        "[{}] 跳过文件 / Skipping file ({}): {error}",
        item.output_name,
        category.display_name()
    );
}
