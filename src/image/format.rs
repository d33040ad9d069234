//! 图像格式与基础数据结构
//!
//! 定义二维强度图像、位深度和二值掩膜。
//! 工具内部统一使用 f32 存储像素，位深度只记录源格式（决定可表示范围与保存格式）。

use crate::error::{self, QuantResult};

/// 源图像位深度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// 8位无符号灰度
    Gray8,
    /// 16位无符号灰度（显微相机最常见）
    Gray16,
    /// 32位浮点灰度
    Gray32Float,
}

impl BitDepth {
    /// 可表示的最大强度值（阈值化的闭区间上界）
    #[inline]
    pub fn max_value(self) -> f64 {
        match self {
            BitDepth::Gray8 => 255.0,
            BitDepth::Gray16 => 65535.0,
            BitDepth::Gray32Float => f32::MAX as f64,
        }
    }

    /// 是否为整数像素格式
    #[inline]
    pub fn is_integer(self) -> bool {
        !matches!(self, BitDepth::Gray32Float)
    }

    /// 将浮点强度量化到本位深度：整数格式四舍五入并截断到可表示范围
    #[inline]
    pub fn quantize(self, value: f64) -> f32 {
        if self.is_integer() {
            value.round().clamp(0.0, self.max_value()) as f32
        } else {
            value as f32
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BitDepth::Gray8 => "8-bit",
            BitDepth::Gray16 => "16-bit",
            BitDepth::Gray32Float => "32-bit float",
        }
    }
}

/// 二维强度图像（加载后不可变）
///
/// 背景归一化等处理总是产生新的图像，而不是原地修改，
/// 因为下游仍需要原始图像上的统计量与强度测量。
#[derive(Debug, Clone, PartialEq)]
pub struct Image2D {
    width: usize,
    height: usize,
    depth: BitDepth,
    /// 每像素物理尺寸（µm）
    pixel_size: f64,
    data: Vec<f32>,
}

impl Image2D {
    /// 创建图像并校验尺寸与标定
    pub fn new(
        width: usize,
        height: usize,
        depth: BitDepth,
        pixel_size: f64,
        data: Vec<f32>,
    ) -> QuantResult<Self> {
        if width == 0 || height == 0 {
            return Err(error::invalid_image_error(
                "图像尺寸必须为正",
                format!("{width}x{height}"),
            ));
        }
        if data.len() != width * height {
            return Err(error::invalid_image_error(
                "像素数量与尺寸不符",
                format!("期望 {}，实际 {}", width * height, data.len()),
            ));
        }
        validate_pixel_size(pixel_size)?;

        Ok(Self {
            width,
            height,
            depth,
            pixel_size,
            data,
        })
    }

    /// 按坐标函数生成图像（测试与掩膜转换使用）
    pub fn from_fn(
        width: usize,
        height: usize,
        depth: BitDepth,
        pixel_size: f64,
        f: impl Fn(usize, usize) -> f32,
    ) -> QuantResult<Self> {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, depth, pixel_size, data)
    }

    /// 常数图像
    pub fn filled(
        width: usize,
        height: usize,
        depth: BitDepth,
        pixel_size: f64,
        value: f32,
    ) -> QuantResult<Self> {
        Self::new(width, height, depth, pixel_size, vec![value; width * height])
    }

    /// 以相同几何与标定包装新的像素数据
    pub fn with_pixels(&self, data: Vec<f32>) -> QuantResult<Self> {
        Self::new(self.width, self.height, self.depth, self.pixel_size, data)
    }

    /// 替换标定（加载器用配置的回退像素尺寸重新标定）
    pub fn with_pixel_size(mut self, pixel_size: f64) -> QuantResult<Self> {
        validate_pixel_size(pixel_size)?;
        self.pixel_size = pixel_size;
        Ok(self)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    #[inline]
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// 单个像素的物理面积（µm²）
    #[inline]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_size * self.pixel_size
    }

    #[inline]
    pub fn pixels(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn same_dimensions(&self, other: &Image2D) -> bool {
        self.width == other.width && self.height == other.height
    }
}

fn validate_pixel_size(pixel_size: f64) -> QuantResult<()> {
    if !pixel_size.is_finite() || pixel_size <= 0.0 {
        return Err(error::invalid_image_error(
            "像素尺寸必须为正",
            format!("{pixel_size} µm"),
        ));
    }
    Ok(())
}

/// 二值掩膜（前景/背景），与源图像尺寸一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl Mask {
    /// 全背景掩膜
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn is_foreground(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// 转为8位图像保存：前景255，背景0（黑背景约定）
    pub fn to_image(&self, pixel_size: f64) -> QuantResult<Image2D> {
        let data = self
            .data
            .iter()
            .map(|&v| if v { 255.0 } else { 0.0 })
            .collect();
        Image2D::new(self.width, self.height, BitDepth::Gray8, pixel_size, data)
    }
}
