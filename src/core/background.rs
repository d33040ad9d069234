//! 背景归一化（滚球算法）
//!
//! 从荧光图像中减去平滑的局部背景，压平大尺度照明梯度并保留局部亮峰（凝聚体）。
//!
//! ## 算法
//! 1. 按块最小值缩小图像（半径 ≤10/≤30/≤100/>100 → 缩小因子 1/2/4/8）
//! 2. 构建裁剪了边缘弧线的球体高度表（强度单位与像素单位相同）
//! 3. 在缩小图上做"滚球"开运算：先腐蚀 min(z − h)，再膨胀 max(e + h)
//! 4. 双线性插值放大回原尺寸
//! 5. 逐像素相减，负值截断为0；整数位深四舍五入

use super::stats::GlobalStats;
use crate::error::{self, QuantResult};
use crate::image::Image2D;
use rayon::prelude::*;

/// 球体结构元素
#[derive(Debug, Clone)]
pub struct RollingBall {
    /// 球面高度表（width × width）
    z_ball: Vec<f32>,
    width: usize,
    shrink_factor: usize,
}

impl RollingBall {
    /// 由滚球半径（像素）构建
    pub fn new(radius: f64) -> Self {
        let (shrink_factor, arc_trim_percent) = if radius <= 10.0 {
            (1usize, 24.0)
        } else if radius <= 30.0 {
            (2, 24.0)
        } else if radius <= 100.0 {
            (4, 32.0)
        } else {
            (8, 40.0)
        };

        let small_radius = (radius / shrink_factor as f64).max(1.0);
        let r_square = small_radius * small_radius;
        let x_trim = ((arc_trim_percent * small_radius) as i64 / 100) as f64;
        let half_width = (small_radius - x_trim).round().max(0.0) as usize;
        let width = 2 * half_width + 1;

        let mut z_ball = Vec::with_capacity(width * width);
        for y in 0..width {
            for x in 0..width {
                let dx = x as f64 - half_width as f64;
                let dy = y as f64 - half_width as f64;
                let temp = r_square - dx * dx - dy * dy;
                z_ball.push(if temp > 0.0 { temp.sqrt() as f32 } else { 0.0 });
            }
        }

        Self {
            z_ball,
            width,
            shrink_factor,
        }
    }

    #[inline]
    pub fn shrink_factor(&self) -> usize {
        self.shrink_factor
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn half_width(&self) -> usize {
        self.width / 2
    }

    #[inline]
    fn height_at(&self, bx: usize, by: usize) -> f32 {
        self.z_ball[by * self.width + bx]
    }
}

/// 归一化结果：新图像 + 归一化前后的全局统计
#[derive(Debug, Clone)]
pub struct Normalized {
    pub image: Image2D,
    pub raw_stats: GlobalStats,
    pub normalized_stats: GlobalStats,
}

/// 背景归一化器
#[derive(Debug, Clone)]
pub struct BackgroundNormalizer {
    radius: f64,
}

impl BackgroundNormalizer {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// 归一化荧光图像；不修改输入
    pub fn normalize(&self, image: &Image2D) -> QuantResult<Normalized> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(error::invalid_image_error(
                "滚球半径必须为正",
                self.radius,
            ));
        }

        let raw_stats = GlobalStats::compute(image);
        let background = self.estimate_background(image);

        let depth = image.depth();
        let data: Vec<f32> = image
            .pixels()
            .iter()
            .zip(&background)
            .map(|(&v, &bg)| {
                let diff = (f64::from(v) - f64::from(bg)).max(0.0);
                depth.quantize(diff)
            })
            .collect();

        let normalized = image.with_pixels(data)?;
        let normalized_stats = GlobalStats::compute(&normalized);

        log::debug!(
            "背景归一化 / Background normalized: radius={} raw_mean={:.3} mean={:.3} sd={:.3}",
            self.radius,
            raw_stats.mean,
            normalized_stats.mean,
            normalized_stats.std_dev
        );

        Ok(Normalized {
            image: normalized,
            raw_stats,
            normalized_stats,
        })
    }

    /// 估计背景（与输入同尺寸）
    pub fn estimate_background(&self, image: &Image2D) -> Vec<f32> {
        let ball = RollingBall::new(self.radius);
        let (width, height) = (image.width(), image.height());
        let factor = ball.shrink_factor();

        if factor > 1 {
            let (small, small_w, small_h) = shrink(image.pixels(), width, height, factor);
            let rolled = roll_ball(&ball, &small, small_w, small_h);
            enlarge(&rolled, small_w, small_h, width, height, factor)
        } else {
            roll_ball(&ball, image.pixels(), width, height)
        }
    }
}

/// 按 factor×factor 块取最小值缩小
fn shrink(pixels: &[f32], width: usize, height: usize, factor: usize) -> (Vec<f32>, usize, usize) {
    let small_w = width.div_ceil(factor);
    let small_h = height.div_ceil(factor);
    let mut small = vec![f32::MAX; small_w * small_h];

    for ys in 0..small_h {
        for xs in 0..small_w {
            let mut min = f32::MAX;
            for y in ys * factor..((ys + 1) * factor).min(height) {
                for x in xs * factor..((xs + 1) * factor).min(width) {
                    min = min.min(pixels[y * width + x]);
                }
            }
            small[ys * small_w + xs] = min;
        }
    }

    (small, small_w, small_h)
}

/// 滚球开运算
///
/// 球心遍历 [-r, w+r) × [-r, h+r)，球体裁剪到图像内。
/// 两步都写成按输出收集的形式，便于按行并行。
fn roll_ball(ball: &RollingBall, pixels: &[f32], width: usize, height: usize) -> Vec<f32> {
    let r = ball.half_width() as i64;
    let (w, h) = (width as i64, height as i64);
    let pos_w = (w + 2 * r) as usize;
    let pos_h = (h + 2 * r) as usize;

    // 腐蚀：每个球心位置上球体能下降到的最低高度
    let mut eroded = vec![0.0f32; pos_w * pos_h];
    eroded
        .par_chunks_mut(pos_w)
        .enumerate()
        .for_each(|(row, out)| {
            let cy = row as i64 - r;
            for (col, slot) in out.iter_mut().enumerate() {
                let cx = col as i64 - r;
                let mut z = f32::MAX;
                for by in 0..ball.width {
                    let y = cy + by as i64 - r;
                    if y < 0 || y >= h {
                        continue;
                    }
                    for bx in 0..ball.width {
                        let x = cx + bx as i64 - r;
                        if x < 0 || x >= w {
                            continue;
                        }
                        let reduced = pixels[(y * w + x) as usize] - ball.height_at(bx, by);
                        if reduced < z {
                            z = reduced;
                        }
                    }
                }
                *slot = z;
            }
        });

    // 膨胀：覆盖该像素的所有球面中的最高点
    let mut background = vec![0.0f32; width * height];
    background
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| {
            for (x, slot) in out.iter_mut().enumerate() {
                let mut best = f32::MIN;
                for by in 0..ball.width {
                    // 球心 = 像素 − 球内偏移，对应 eroded 中的下标再加 r
                    let cy = y as i64 - (by as i64 - r) + r;
                    for bx in 0..ball.width {
                        let cx = x as i64 - (bx as i64 - r) + r;
                        let z = eroded[cy as usize * pos_w + cx as usize];
                        let added = z + ball.height_at(bx, by);
                        if added > best {
                            best = added;
                        }
                    }
                }
                *slot = best;
            }
        });

    background
}

/// 插值下标与权重：small[index] 权重 weight，small[index+1] 权重 1-weight
fn interpolation_arrays(
    length: usize,
    small_length: usize,
    factor: usize,
) -> Vec<(usize, usize, f32)> {
    let f = factor as i64;
    (0..length as i64)
        .map(|i| {
            if small_length < 2 {
                return (0, 0, 1.0);
            }
            let mut index = (i - f / 2) / f;
            if index >= small_length as i64 - 1 {
                index = small_length as i64 - 2;
            }
            let distance = (i as f32 + 0.5) / factor as f32 - (index as f32 + 0.5);
            (index as usize, index as usize + 1, 1.0 - distance)
        })
        .collect()
}

/// 双线性插值放大回原尺寸
fn enlarge(
    small: &[f32],
    small_w: usize,
    small_h: usize,
    width: usize,
    height: usize,
    factor: usize,
) -> Vec<f32> {
    let xs = interpolation_arrays(width, small_w, factor);
    let ys = interpolation_arrays(height, small_h, factor);
    let at = |x: usize, y: usize| small[y * small_w + x];

    let mut out = Vec::with_capacity(width * height);
    for &(y0, y1, wy) in &ys {
        for &(x0, x1, wx) in &xs {
            let line0 = at(x0, y0) * wx + at(x1, y0) * (1.0 - wx);
            let line1 = at(x0, y1) * wx + at(x1, y1) * (1.0 - wx);
            out.push(line0 * wy + line1 * (1.0 - wy));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BitDepth;

    #[test]
    fn test_ball_geometry_for_default_radius() {
        let ball = RollingBall::new(20.0);
        assert_eq!(ball.shrink_factor(), 2);
        assert_eq!(ball.width(), 17);
        // 球心高度 = 缩小后的半径
        assert_eq!(ball.height_at(8, 8), 10.0);
    }

    #[test]
    fn test_small_radius_has_no_shrink() {
        let ball = RollingBall::new(5.0);
        assert_eq!(ball.shrink_factor(), 1);
        // xtrim = (24*5)/100 = 1, half width = 4
        assert_eq!(ball.width(), 9);
    }

    #[test]
    fn test_flat_image_normalizes_to_zero() {
        let image = Image2D::filled(10, 10, BitDepth::Gray16, 0.1, 10.0).unwrap();
        let normalized = BackgroundNormalizer::new(20.0).normalize(&image).unwrap();
        assert!(normalized.image.pixels().iter().all(|&v| v == 0.0));
        assert_eq!(normalized.raw_stats.mean, 10.0);
        assert_eq!(normalized.normalized_stats.std_dev, 0.0);
        // 输入保持不变
        assert!(image.pixels().iter().all(|&v| v == 10.0));
    }

    #[test]
    fn test_gradient_is_flattened_and_peak_kept() {
        let image = Image2D::from_fn(64, 64, BitDepth::Gray16, 0.1, |x, _| {
            let base = 100.0 + x as f32 * 2.0;
            if (30..33).contains(&x) { base + 500.0 } else { base }
        })
        .unwrap();
        let normalized = BackgroundNormalizer::new(20.0).normalize(&image).unwrap();

        // 远离亮带的像素几乎被完全扣除
        assert!(normalized.image.get(5, 32) < 5.0);
        // 亮带本身保留
        assert!(normalized.image.get(31, 32) > 450.0);
        assert!(normalized.image.pixels().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_background_never_exceeds_input() {
        let image = Image2D::from_fn(40, 30, BitDepth::Gray32Float, 0.1, |x, y| {
            ((x * 7 + y * 13) % 11) as f32 + 0.5
        })
        .unwrap();
        let normalizer = BackgroundNormalizer::new(8.0);
        let background = normalizer.estimate_background(&image);
        for (bg, v) in background.iter().zip(image.pixels()) {
            assert!(bg <= &(v + 1e-4));
        }
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let image = Image2D::filled(4, 4, BitDepth::Gray8, 0.1, 1.0).unwrap();
        assert!(BackgroundNormalizer::new(0.0).normalize(&image).is_err());
    }

    #[test]
    fn test_interpolation_indices_stay_in_bounds() {
        for (i0, i1, w) in interpolation_arrays(10, 5, 2) {
            assert!(i1 == i0 + 1 && i1 < 5);
            assert!((-1.0..=2.0).contains(&w));
        }
    }
}
