//! 区域形状几何
//!
//! - 外轮廓追踪（像素角点网格，8连通）与带对角修正的周长
//! - 二阶矩等面积椭圆拟合（长轴、短轴）
//! - 像素角点凸包面积
//!
//! 所有量都以像素为单位；形状描述子是无量纲比值。

use std::f64::consts::PI;

/// 区域在包围盒内的局部二值网格
#[derive(Debug, Clone)]
pub struct RegionGrid {
    /// 包围盒左上角（全图坐标）
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
    cells: Vec<bool>,
}

impl RegionGrid {
    /// 由区域像素（全图坐标）构建
    pub fn from_pixels(pixels: &[(usize, usize)]) -> Self {
        let x0 = pixels.iter().map(|p| p.0).min().unwrap_or(0);
        let y0 = pixels.iter().map(|p| p.1).min().unwrap_or(0);
        let x1 = pixels.iter().map(|p| p.0).max().unwrap_or(0);
        let y1 = pixels.iter().map(|p| p.1).max().unwrap_or(0);
        let width = x1 - x0 + 1;
        let height = y1 - y0 + 1;

        let mut cells = vec![false; width * height];
        for &(x, y) in pixels {
            cells[(y - y0) * width + (x - x0)] = true;
        }

        Self {
            x0,
            y0,
            width,
            height,
            cells,
        }
    }

    /// 局部坐标查询，越界视为背景
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.cells[y as usize * self.width + x as usize]
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }

    /// 区域像素（全图坐标，行优先）
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).filter_map(move |x| {
                self.cells[y * self.width + x].then_some((self.x0 + x, self.y0 + y))
            })
        })
    }

    /// 行优先的第一个像素（局部坐标），即轮廓追踪起点
    fn first_pixel(&self) -> Option<(i64, i64)> {
        self.cells
            .iter()
            .position(|&v| v)
            .map(|i| ((i % self.width) as i64, (i / self.width) as i64))
    }
}

/// 形状描述子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDescriptors {
    /// 周长（像素）
    pub perimeter: f64,
    /// 4π·面积/周长²，截断到[0, 1]
    pub circularity: f64,
    /// 拟合椭圆长轴（像素）
    pub major_axis: f64,
    /// 拟合椭圆短轴（像素）
    pub minor_axis: f64,
    /// 长轴/短轴
    pub aspect_ratio: f64,
    /// 4·面积/(π·长轴²)
    pub roundness: f64,
    /// 面积/凸包面积
    pub solidity: f64,
}

impl ShapeDescriptors {
    /// 计算区域的全部形状描述子（面积以像素计）
    pub fn measure(grid: &RegionGrid) -> Self {
        let area = grid.count() as f64;
        let perimeter = traced_perimeter(grid);
        let circularity = if perimeter > 0.0 {
            (4.0 * PI * area / (perimeter * perimeter)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (major_axis, minor_axis) = fit_ellipse(grid);
        let aspect_ratio = major_axis / minor_axis;
        let roundness = 4.0 * area / (PI * major_axis * major_axis);

        let hull = convex_hull_area(grid);
        let solidity = if hull > 0.0 { area / hull } else { f64::NAN };

        Self {
            perimeter,
            circularity,
            major_axis,
            minor_axis,
            aspect_ratio,
            roundness,
            solidity,
        }
    }
}

/// 方向：东、南、西、北（顺时针，右转 = +1）
const DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// 追踪外轮廓，返回方向改变处的顶点（像素角点坐标）
///
/// 从首像素左上角向东出发，区域始终在行进方向右侧。
/// 每个顶点处依次尝试左转、直行、右转，左前方像素在区域内即左转（8连通）。
pub fn trace_outline(grid: &RegionGrid) -> Vec<(i64, i64)> {
    let Some(start) = grid.first_pixel() else {
        return Vec::new();
    };

    let mut vertices = Vec::new();
    let (mut x, mut y) = start;
    let mut dir = 0usize;

    loop {
        let (dx, dy) = DIRECTIONS[dir];
        x += dx;
        y += dy;
        if (x, y) == start {
            break;
        }

        // 顶点四周像素：tl (x-1,y-1)  tr (x,y-1)  bl (x-1,y)  br (x,y)
        let tl = grid.contains(x - 1, y - 1);
        let tr = grid.contains(x, y - 1);
        let bl = grid.contains(x - 1, y);
        let br = grid.contains(x, y);
        let (ahead_left, ahead_right) = match dir {
            0 => (tr, br),
            1 => (br, bl),
            2 => (bl, tl),
            _ => (tl, tr),
        };

        let next = if ahead_left {
            (dir + 3) % 4
        } else if ahead_right {
            dir
        } else {
            (dir + 1) % 4
        };

        if next != dir {
            vertices.push((x, y));
        }
        dir = next;
    }

    // 起点总是一个拐角（自北转东）
    vertices.push(start);
    vertices
}

/// 带对角修正的轮廓周长
///
/// sumdx + sumdy − nCorners·(2 − √2)；连续的单位长度拐角交替计数，
/// 阶梯状的对角边因此按 √2 计。
pub fn traced_perimeter(grid: &RegionGrid) -> f64 {
    let points = trace_outline(grid);
    let n = points.len();
    if n == 0 {
        return 0.0;
    }

    let mut sum_dx = 0i64;
    let mut sum_dy = 0i64;
    let mut corners = 0usize;

    let mut dx1 = points[0].0 - points[n - 1].0;
    let mut dy1 = points[0].1 - points[n - 1].1;
    let mut side1 = dx1.abs() + dy1.abs();
    let mut corner = false;

    for i in 0..n {
        let next = (i + 1) % n;
        let dx2 = points[next].0 - points[i].0;
        let dy2 = points[next].1 - points[i].1;
        sum_dx += dx1.abs();
        sum_dy += dy1.abs();
        let side2 = dx2.abs() + dy2.abs();
        if side1 > 1 || !corner {
            corner = true;
            corners += 1;
        } else {
            corner = false;
        }
        dx1 = dx2;
        dy1 = dy2;
        side1 = side2;
    }

    (sum_dx + sum_dy) as f64 - corners as f64 * (2.0 - 2.0f64.sqrt())
}

/// 等面积椭圆拟合，返回 (长轴, 短轴)
///
/// 协方差取像素中心的二阶中心矩并加上单像素自身的 1/12 方差；
/// 再缩放使 π/4·长轴·短轴 = 像素数。
pub fn fit_ellipse(grid: &RegionGrid) -> (f64, f64) {
    let n = grid.count() as f64;
    let (mut sx, mut sy) = (0.0, 0.0);
    for (x, y) in grid.pixels() {
        sx += x as f64;
        sy += y as f64;
    }
    let (cx, cy) = (sx / n, sy / n);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in grid.pixels() {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let uxx = sxx / n + 1.0 / 12.0;
    let uyy = syy / n + 1.0 / 12.0;
    let uxy = sxy / n;

    let half_trace = (uxx + uyy) / 2.0;
    let spread = (((uxx - uyy) / 2.0).powi(2) + uxy * uxy).sqrt();
    let lambda1 = half_trace + spread;
    let lambda2 = (half_trace - spread).max(f64::MIN_POSITIVE);

    let k = (4.0 * n / (PI * (lambda1 * lambda2).sqrt())).sqrt();
    (k * lambda1.sqrt(), k * lambda2.sqrt())
}

/// 像素角点凸包面积（单调链 + 鞋带公式）
pub fn convex_hull_area(grid: &RegionGrid) -> f64 {
    let mut points: Vec<(i64, i64)> = Vec::new();
    for (x, y) in grid.pixels() {
        let (x, y) = (x as i64, y as i64);
        points.extend([(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]);
    }
    points.sort_unstable();
    points.dedup();

    if points.len() < 3 {
        return 0.0;
    }

    let cross = |o: (i64, i64), a: (i64, i64), b: (i64, i64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut hull: Vec<(i64, i64)> = Vec::with_capacity(points.len() * 2);
    for &p in &points {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in points.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();

    let mut twice_area = 0i64;
    for i in 0..hull.len() {
        let (a, b) = (hull[i], hull[(i + 1) % hull.len()]);
        twice_area += a.0 * b.1 - b.0 * a.1;
    }
    twice_area.abs() as f64 / 2.0
}
