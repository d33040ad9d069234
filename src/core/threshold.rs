//! 自适应阈值
//!
//! T = mean + k·sd（k默认为3），在归一化图像上计算；
//! 前景区间为 [T, 位深最大值] 闭区间。

use super::stats::GlobalStats;
use crate::image::{Image2D, Mask};

/// 阈值结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    /// 下界 T
    pub value: f64,
    /// 上界（图像可表示的最大强度）
    pub upper: f64,
    /// 标准差为0的平坦图像：T = mean，掩膜全背景
    pub degenerate: bool,
}

impl Threshold {
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.value && value <= self.upper
    }
}

/// 自适应阈值器
#[derive(Debug, Clone)]
pub struct AdaptiveThresholder {
    sigma_factor: f64,
}

impl AdaptiveThresholder {
    pub fn new(sigma_factor: f64) -> Self {
        Self { sigma_factor }
    }

    /// 由归一化统计计算阈值
    pub fn threshold(&self, stats: &GlobalStats, image: &Image2D) -> Threshold {
        let degenerate = stats.std_dev == 0.0;
        Threshold {
            value: stats.mean + self.sigma_factor * stats.std_dev,
            upper: image.depth().max_value(),
            degenerate,
        }
    }

    /// 按阈值生成二值掩膜
    ///
    /// 平坦图像不存在离群亮点，直接返回全背景。
    pub fn apply(&self, image: &Image2D, threshold: &Threshold) -> Mask {
        if threshold.is_degenerate() {
            return Mask::empty(image.width(), image.height());
        }
        Mask::from_fn(image.width(), image.height(), |x, y| {
            threshold.contains(f64::from(image.get(x, y)))
        })
    }

    /// 阈值 + 掩膜
    pub fn binarize(&self, image: &Image2D, stats: &GlobalStats) -> (Threshold, Mask) {
        let threshold = self.threshold(stats, image);
        let mask = self.apply(image, &threshold);
        log::debug!(
            "阈值 / Threshold: T={:.3} foreground={} degenerate={}",
            threshold.value,
            mask.foreground_count(),
            threshold.degenerate
        );
        (threshold, mask)
    }
}
