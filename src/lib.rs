//! Condensate Meter - 荧光凝聚体定量工具
//!
//! 对双通道显微图像（荧光 + 明场/相差参考）批量定量荧光凝聚体。
//!
//! ## 处理流程
//! - 滚球背景扣除：把不均匀的照明背景拉平到0附近
//! - 自适应阈值：T = mean + 3·sd（基于归一化后的全局统计）
//! - 颗粒提取：8连通区域、填洞、面积过滤、边界排除，测量形态与强度
//! - 单图像聚合：每颗粒一行（零颗粒时一行NaN哨兵行）并附带全局统计溯源列
//! - 批处理汇总：每个图像一行，按文件名顺序，支持文件级并行

pub mod core;
pub mod error;
pub mod image;
pub mod processing;
pub mod tools;

// 重新导出核心类型
pub use crate::core::{GlobalStats, Particle, Threshold};
pub use error::{QuantError, QuantResult};
pub use image::{ChannelPair, ChannelPairLoader, Image2D, Mask, TiffChannelLoader};
pub use processing::{
    AnalysisConfig, BatchDriver, BatchOutcome, BatchSummaryTable, DateTag, ExecutionMode,
    PerImageReport, PipelineContext,
};
