//! 单图像流水线
//!
//! 加载器 → 背景归一化 → 自适应阈值 → 颗粒提取 → 单图像聚合，严格前向。
//! 每次调用创建一个上下文对象，处理完一个文件即丢弃，不存在跨图像共享的可变状态。

use super::aggregator::{DateTag, PerImageReport};
use crate::core::{
    AdaptiveThresholder, BackgroundNormalizer, EdgePolicy, ParticleExtractor, SizeFilter,
};
use crate::error::{QuantError, QuantResult};
use crate::image::{ChannelPair, Mask};
use crate::tools::constants::{analysis, defaults};

/// 不可变的分析参数
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// 滚球半径（像素）
    pub rolling_radius: f64,
    /// 面积过滤（µm²）
    pub size_filter: SizeFilter,
    /// 边界颗粒策略
    pub edge_policy: EdgePolicy,
    /// 阈值的标准差倍数
    pub sigma_factor: f64,
    /// 文件无标定时的像素尺寸（µm）
    pub fallback_pixel_size: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rolling_radius: defaults::ROLLING_RADIUS,
            size_filter: SizeFilter::new(defaults::MIN_PARTICLE_AREA, defaults::MAX_PARTICLE_AREA),
            edge_policy: EdgePolicy::Exclude,
            sigma_factor: analysis::SIGMA_FACTOR,
            fallback_pixel_size: defaults::PIXEL_SIZE_MICRONS,
        }
    }
}

impl AnalysisConfig {
    /// 启动时校验；任何错误都是致命的配置错误
    pub fn validate(&self) -> QuantResult<()> {
        let positive = |value: f64| value.is_finite() && value > 0.0;

        if !positive(self.rolling_radius) {
            return Err(QuantError::InvalidConfig(format!(
                "滚球半径必须为正: {}",
                self.rolling_radius
            )));
        }
        if !positive(self.size_filter.min_area) || !positive(self.size_filter.max_area) {
            return Err(QuantError::InvalidConfig(format!(
                "面积过滤上下界必须为正: {}-{}",
                self.size_filter.min_area, self.size_filter.max_area
            )));
        }
        if self.size_filter.min_area > self.size_filter.max_area {
            return Err(QuantError::InvalidConfig(format!(
                "面积下界大于上界: {} > {}",
                self.size_filter.min_area, self.size_filter.max_area
            )));
        }
        if !self.sigma_factor.is_finite() || self.sigma_factor < 0.0 {
            return Err(QuantError::InvalidConfig(format!(
                "标准差倍数无效: {}",
                self.sigma_factor
            )));
        }
        if !positive(self.fallback_pixel_size) {
            return Err(QuantError::InvalidConfig(format!(
                "像素尺寸必须为正: {}",
                self.fallback_pixel_size
            )));
        }
        Ok(())
    }
}

/// 单图像分析结果：报告 + 需要交给持久化器的掩膜
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub report: PerImageReport,
    pub mask: Mask,
}

/// 单次调用的流水线上下文
#[derive(Debug)]
pub struct PipelineContext<'a> {
    config: &'a AnalysisConfig,
    date: &'a DateTag,
    file_id: String,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: &'a AnalysisConfig, date: &'a DateTag, file_id: impl Into<String>) -> Self {
        Self {
            config,
            date,
            file_id: file_id.into(),
        }
    }

    /// 运行全部阶段，消费上下文
    pub fn run(self, pair: &ChannelPair) -> QuantResult<ImageAnalysis> {
        let fluorescence = pair.fluorescence();

        let normalized =
            BackgroundNormalizer::new(self.config.rolling_radius).normalize(fluorescence)?;

        let thresholder = AdaptiveThresholder::new(self.config.sigma_factor);
        let (threshold, mask) =
            thresholder.binarize(&normalized.image, &normalized.normalized_stats);

        let extractor = ParticleExtractor::new(self.config.size_filter, self.config.edge_policy);
        let particles = extractor.extract(&mask, fluorescence)?;

        log::debug!(
            "[{}] 阈值 {:.3}，检测到 {} 个颗粒 / threshold {:.3}, {} particles",
            self.file_id,
            threshold.value,
            particles.len(),
            threshold.value,
            particles.len()
        );

        let report = PerImageReport::aggregate(
            &particles,
            normalized.raw_stats,
            normalized.normalized_stats,
            threshold,
            self.date.clone(),
            self.file_id,
        );

        Ok(ImageAnalysis { report, mask })
    }
}
