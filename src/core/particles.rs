//! 颗粒提取
//!
//! 在二值掩膜上做8连通区域生长，按物理面积过滤，
//! 并在未做背景扣除的原始荧光图像上测量强度。

use super::shape::{RegionGrid, ShapeDescriptors};
use crate::error::{self, QuantResult};
use crate::image::{Image2D, Mask};

/// 面积过滤范围（µm²，闭区间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeFilter {
    pub min_area: f64,
    pub max_area: f64,
}

impl SizeFilter {
    pub fn new(min_area: f64, max_area: f64) -> Self {
        Self { min_area, max_area }
    }

    #[inline]
    pub fn accepts(&self, area: f64) -> bool {
        area >= self.min_area && area <= self.max_area
    }
}

/// 接触图像边界的区域处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    /// 排除接触边界的区域（避免残缺颗粒偏差）
    #[default]
    Exclude,
    /// 保留接触边界的区域
    Include,
}

/// 单个颗粒的测量结果
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// 像素数（不含内部孔洞）
    pub pixel_count: usize,
    /// 面积（µm²）
    pub area: f64,
    /// 平均强度（原始荧光）
    pub mean_intensity: f64,
    pub min_intensity: f64,
    pub max_intensity: f64,
    /// 积分密度 = 像素数 × 平均强度（原始强度之和）
    pub integrated_density: f64,
    /// 质心（µm）
    pub centroid_x: f64,
    pub centroid_y: f64,
    /// 周长（µm）
    pub perimeter: f64,
    pub circularity: f64,
    pub aspect_ratio: f64,
    pub roundness: f64,
    pub solidity: f64,
}

impl Particle {
    /// 标定积分密度 = 面积(µm²) × 平均强度
    #[inline]
    pub fn calibrated_integrated_density(&self) -> f64 {
        self.area * self.mean_intensity
    }
}

/// 颗粒提取器
#[derive(Debug, Clone)]
pub struct ParticleExtractor {
    size_filter: SizeFilter,
    edge_policy: EdgePolicy,
}

impl ParticleExtractor {
    pub fn new(size_filter: SizeFilter, edge_policy: EdgePolicy) -> Self {
        Self {
            size_filter,
            edge_policy,
        }
    }

    /// 提取颗粒，顺序为连通区域的扫描顺序
    ///
    /// `intensity` 为原始荧光图像，像素尺寸取自其标定。
    pub fn extract(&self, mask: &Mask, intensity: &Image2D) -> QuantResult<Vec<Particle>> {
        if mask.width() != intensity.width() || mask.height() != intensity.height() {
            return Err(error::invalid_image_error(
                "掩膜与荧光图像尺寸不一致",
                format!(
                    "{}x{} vs {}x{}",
                    mask.width(),
                    mask.height(),
                    intensity.width(),
                    intensity.height()
                ),
            ));
        }

        let pixel_size = intensity.pixel_size();
        let pixel_area = intensity.pixel_area();
        let mut particles = Vec::new();
        let mut rejected = 0usize;

        for region in connected_regions(mask) {
            if region.touches_border && self.edge_policy == EdgePolicy::Exclude {
                rejected += 1;
                continue;
            }

            // 内部孔洞不计入面积，也不参与强度与形状测量
            let pixel_count = region.pixels.len();
            let area = pixel_count as f64 * pixel_area;
            if !self.size_filter.accepts(area) {
                rejected += 1;
                continue;
            }

            let grid = RegionGrid::from_pixels(&region.pixels);
            particles.push(measure(&grid, intensity, pixel_count, area, pixel_size));
        }

        log::debug!(
            "颗粒提取 / Particles: kept={} rejected={rejected}",
            particles.len()
        );

        Ok(particles)
    }
}

fn measure(
    grid: &RegionGrid,
    intensity: &Image2D,
    pixel_count: usize,
    area: f64,
    pixel_size: f64,
) -> Particle {
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let (mut sx, mut sy) = (0.0, 0.0);

    for (x, y) in grid.pixels() {
        let v = f64::from(intensity.get(x, y));
        sum += v;
        min = min.min(v);
        max = max.max(v);
        sx += x as f64 + 0.5;
        sy += y as f64 + 0.5;
    }

    let n = pixel_count as f64;
    let mean = sum / n;
    let shape = ShapeDescriptors::measure(grid);

    Particle {
        pixel_count,
        area,
        mean_intensity: mean,
        min_intensity: min,
        max_intensity: max,
        integrated_density: n * mean,
        centroid_x: sx / n * pixel_size,
        centroid_y: sy / n * pixel_size,
        perimeter: shape.perimeter * pixel_size,
        circularity: shape.circularity,
        aspect_ratio: shape.aspect_ratio,
        roundness: shape.roundness,
        solidity: shape.solidity,
    }
}

/// 连通区域（全图坐标）
#[derive(Debug, Clone)]
pub struct Region {
    pub pixels: Vec<(usize, usize)>,
    pub touches_border: bool,
}

/// 8连通区域生长，按行优先扫描顺序返回
pub fn connected_regions(mask: &Mask) -> Vec<Region> {
    let (width, height) = (mask.width(), mask.height());
    let mut visited = vec![false; width * height];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for sy in 0..height {
        for sx in 0..width {
            if visited[sy * width + sx] || !mask.is_foreground(sx, sy) {
                continue;
            }

            let mut pixels = Vec::new();
            let mut touches_border = false;
            visited[sy * width + sx] = true;
            stack.push((sx, sy));

            while let Some((x, y)) = stack.pop() {
                pixels.push((x, y));
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    touches_border = true;
                }

                for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        let idx = ny * width + nx;
                        if !visited[idx] && mask.is_foreground(nx, ny) {
                            visited[idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            regions.push(Region {
                pixels,
                touches_border,
            });
        }
    }

    regions
}
