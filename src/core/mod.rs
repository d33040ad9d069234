//! 核心算法模块
//!
//! 分割与定量流水线的各个阶段：
//! 全局统计 → 背景归一化 → 自适应阈值 → 颗粒提取（含形状几何）。

pub mod background;
pub mod particles;
pub mod shape;
pub mod stats;
pub mod threshold;

// 重新导出公共接口
pub use background::{BackgroundNormalizer, Normalized, RollingBall};
pub use particles::{EdgePolicy, Particle, ParticleExtractor, SizeFilter};
pub use shape::ShapeDescriptors;
pub use stats::GlobalStats;
pub use threshold::{AdaptiveThresholder, Threshold};
