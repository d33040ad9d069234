//! 流水线与批处理模块
//!
//! 单图像流水线（归一化 → 阈值 → 颗粒提取 → 聚合）、结果表模型、
//! 持久化接口，以及串行/有序并行的批处理驱动。

pub mod aggregator;
pub mod batch;
pub mod batch_state;
pub mod persister;
pub mod pipeline;
pub mod table;

// 重新导出公共接口
pub use aggregator::{
    AttributeAccumulators, BatchSummaryRow, BatchSummaryTable, DateTag, MeasurementRow,
    PER_IMAGE_COLUMNS, ParticleAttribute, PerImageReport, RunningStats, SUMMARY_COLUMNS,
};
pub use batch::{BatchDriver, BatchOutcome, ExecutionMode};
pub use batch_state::{BatchStatsSnapshot, CancelToken, ParallelBatchStats, SerialBatchStats};
pub use persister::{OutputSlot, ResultPersister};
pub use pipeline::{AnalysisConfig, ImageAnalysis, PipelineContext};
pub use table::{Cell, ResultTable};
