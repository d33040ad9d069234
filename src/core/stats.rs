//! 全局强度统计
//!
//! 每张图像计算两次：归一化前（原始，仅作审计元数据）与归一化后（驱动阈值公式）。

use crate::image::Image2D;

/// 浮点图像众数所用直方图的bin数
const FLOAT_MODE_BINS: usize = 256;

/// 图像全体像素的描述统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalStats {
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    /// 样本标准差（n-1分母）
    pub std_dev: f64,
}

impl GlobalStats {
    /// 计算图像的均值、中位数、众数与标准差
    pub fn compute(image: &Image2D) -> Self {
        let pixels = image.pixels();
        let n = pixels.len();

        let sum: f64 = pixels.iter().map(|&v| f64::from(v)).sum();
        let mean = sum / n as f64;

        let std_dev = if n > 1 {
            let ss: f64 = pixels
                .iter()
                .map(|&v| {
                    let d = f64::from(v) - mean;
                    d * d
                })
                .sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        let mut sorted: Vec<f32> = pixels.to_vec();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        let median = if n % 2 == 1 {
            f64::from(sorted[n / 2])
        } else {
            (f64::from(sorted[n / 2 - 1]) + f64::from(sorted[n / 2])) / 2.0
        };

        let mode = if image.depth().is_integer() {
            most_frequent(&sorted)
        } else {
            binned_mode(&sorted)
        };

        Self {
            mean,
            median,
            mode,
            std_dev,
        }
    }
}

/// 已排序数据中出现次数最多的值（并列取最小值）
fn most_frequent(sorted: &[f32]) -> f64 {
    let mut best_value = sorted[0];
    let mut best_count = 0usize;
    let mut run_value = sorted[0];
    let mut run_count = 0usize;

    for &v in sorted {
        if v == run_value {
            run_count += 1;
        } else {
            run_value = v;
            run_count = 1;
        }
        if run_count > best_count {
            best_count = run_count;
            best_value = run_value;
        }
    }

    f64::from(best_value)
}

/// 浮点数据：在[min, max]上做256-bin直方图，返回最满bin的下边界
fn binned_mode(sorted: &[f32]) -> f64 {
    let min = f64::from(sorted[0]);
    let max = f64::from(sorted[sorted.len() - 1]);
    if max <= min {
        return min;
    }

    let bin_width = (max - min) / FLOAT_MODE_BINS as f64;
    let mut bins = [0usize; FLOAT_MODE_BINS];
    for &v in sorted {
        let index = ((f64::from(v) - min) / bin_width) as usize;
        bins[index.min(FLOAT_MODE_BINS - 1)] += 1;
    }

    let mut best = 0;
    for (i, &count) in bins.iter().enumerate() {
        if count > bins[best] {
            best = i;
        }
    }

    min + best as f64 * bin_width
}
