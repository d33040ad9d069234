//! 批处理状态管理模块
//!
//! 批处理的取消令牌，以及成功/失败计数与按错误类别归档的失败文件列表（串行与并行两种实现）。

use crate::error::ErrorCategory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 取消令牌：只在文件之间检查，已写出的结果和已追加的汇总行保持有效
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 批处理统计快照
#[derive(Debug, Clone, Default)]
pub struct BatchStatsSnapshot {
    /// 成功处理的文件数
    pub processed: usize,
    /// 失败（被跳过）的文件数
    pub failed: usize,
    /// 错误分类统计（错误类型 -> 失败文件列表）
    pub error_stats: HashMap<ErrorCategory, Vec<String>>,
}

impl BatchStatsSnapshot {
    /// 已尝试的文件数
    #[inline]
    pub fn attempted(&self) -> usize {
        self.processed + self.failed
    }

    /// 成功率（百分比）；没有尝试任何文件时为0
    pub fn success_rate(&self) -> f64 {
        if self.attempted() == 0 {
            0.0
        } else {
            self.processed as f64 / self.attempted() as f64 * 100.0
        }
    }
}

/// 串行批处理统计（单线程）
#[derive(Debug, Default)]
pub struct SerialBatchStats {
    processed: usize,
    failed: usize,
    error_stats: HashMap<ErrorCategory, Vec<String>>,
}

impl SerialBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_processed(&mut self) -> usize {
        self.processed += 1;
        self.processed
    }

    /// 增加失败计数并记录错误分类
    #[inline]
    pub fn inc_failed(&mut self, category: ErrorCategory, file_id: String) -> usize {
        self.failed += 1;
        self.error_stats.entry(category).or_default().push(file_id);
        self.failed
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            processed: self.processed,
            failed: self.failed,
            error_stats: self.error_stats.clone(),
        }
    }
}

/// 并行批处理统计（多线程安全）
///
/// 工作线程完成顺序不确定，失败文件列表按完成顺序记录。
#[derive(Debug, Clone, Default)]
pub struct ParallelBatchStats {
    processed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    error_stats: Arc<Mutex<HashMap<ErrorCategory, Vec<String>>>>,
}

impl ParallelBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_failed(&self, category: ErrorCategory, file_id: String) -> usize {
        let count = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut stats) = self.error_stats.lock() {
            stats.entry(category).or_default().push(file_id);
        }
        count
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            error_stats: self
                .error_stats
                .lock()
                .map(|stats| stats.clone())
                .unwrap_or_default(),
        }
    }
}
