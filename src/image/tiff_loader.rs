//! TIFF通道对加载器
//!
//! 支持两种双通道布局：
//! - 多页TIFF：第0页荧光，第1页参考通道
//! - 单页多样本TIFF：样本0荧光，样本1参考通道
//!
//! 标定读取ImageJ元数据（ImageDescription中的 `unit=micron` 与 XResolution），
//! 缺失时使用配置的回退像素尺寸。

use super::channel_pair::{self, ChannelPair, ChannelPairLoader};
use super::format::{BitDepth, Image2D};
use crate::error::{self, QuantResult};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tiff::ColorType;
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

/// ImageJ描述中表示微米的单位写法
const MICRON_UNITS: &[&str] = &["micron", "microns", "um", "µm", "\\u00B5m"];

/// 解码后的一页（可能含多个交错样本）
struct DecodedPlane {
    width: usize,
    height: usize,
    depth: BitDepth,
    samples_per_pixel: usize,
    data: Vec<f32>,
}

impl DecodedPlane {
    /// 提取单个样本通道
    fn channel(&self, sample: usize) -> Vec<f32> {
        self.data
            .iter()
            .skip(sample)
            .step_by(self.samples_per_pixel)
            .copied()
            .collect()
    }
}

/// 基于tiff crate的通道对加载器
#[derive(Debug, Clone)]
pub struct TiffChannelLoader {
    fallback_pixel_size: f64,
}

impl TiffChannelLoader {
    /// `fallback_pixel_size`: 文件不含标定时使用的像素尺寸（µm）
    pub fn new(fallback_pixel_size: f64) -> Self {
        Self {
            fallback_pixel_size,
        }
    }

    fn decode<R: Read + Seek>(
        &self,
        mut decoder: Decoder<R>,
        source: &str,
    ) -> QuantResult<(Image2D, Image2D, f64)> {
        // 标定只看第一页
        let description = decoder.get_tag_ascii_string(Tag::ImageDescription).ok();
        let x_resolution = decoder.find_tag(Tag::XResolution).ok().flatten();
        let pixel_size = parse_calibration(description.as_deref(), x_resolution)
            .unwrap_or(self.fallback_pixel_size);

        let first = read_plane(&mut decoder, source)?;

        let (fluorescence, reference) = if first.samples_per_pixel >= 2 {
            let fluorescence = plane_to_image(&first, first.channel(0), pixel_size)?;
            let reference = plane_to_image(&first, first.channel(1), pixel_size)?;
            (fluorescence, reference)
        } else if decoder.more_images() {
            decoder
                .next_image()
                .map_err(|e| error::unreadable_error(source, e))?;
            let second = read_plane(&mut decoder, source)?;
            let fluorescence = plane_to_image(&first, first.channel(0), pixel_size)?;
            let reference = plane_to_image(&second, second.channel(0), pixel_size)?;
            (fluorescence, reference)
        } else {
            return Err(error::unreadable_error(
                source,
                "需要两个通道（两页或每像素两个样本），仅找到一个",
            ));
        };

        Ok((fluorescence, reference, pixel_size))
    }
}

impl ChannelPairLoader for TiffChannelLoader {
    fn load(&self, path: &Path) -> QuantResult<ChannelPair> {
        let source = path.display().to_string();
        let file = File::open(path)?;
        let decoder =
            Decoder::new(BufReader::new(file)).map_err(|e| error::unreadable_error(&source, e))?;

        let (fluorescence, reference, pixel_size) = self.decode(decoder, &source)?;

        log::debug!(
            "加载通道对 / Loaded channel pair: {source} {}x{} {} px={pixel_size:.4}µm",
            fluorescence.width(),
            fluorescence.height(),
            fluorescence.depth().display_name()
        );

        ChannelPair::new(
            fluorescence,
            reference,
            pixel_size,
            channel_pair::file_id(path),
        )
    }
}

fn read_plane<R: Read + Seek>(decoder: &mut Decoder<R>, source: &str) -> QuantResult<DecodedPlane> {
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| error::unreadable_error(source, e))?;

    let samples_per_pixel = match decoder
        .colortype()
        .map_err(|e| error::unreadable_error(source, e))?
    {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(error::unreadable_error(
                source,
                format!("不支持的颜色类型 {other:?}"),
            ));
        }
    };

    let (depth, data): (BitDepth, Vec<f32>) = match decoder
        .read_image()
        .map_err(|e| error::unreadable_error(source, e))?
    {
        DecodingResult::U8(buf) => (BitDepth::Gray8, buf.into_iter().map(f32::from).collect()),
        DecodingResult::U16(buf) => (BitDepth::Gray16, buf.into_iter().map(f32::from).collect()),
        DecodingResult::F32(buf) => (BitDepth::Gray32Float, buf),
        _ => {
            return Err(error::unreadable_error(
                source,
                "仅支持8位、16位整数或32位浮点像素",
            ));
        }
    };

    let (width, height) = (width as usize, height as usize);
    if data.len() != width * height * samples_per_pixel {
        return Err(error::unreadable_error(
            source,
            format!(
                "像素数据长度异常: {} (期望 {})",
                data.len(),
                width * height * samples_per_pixel
            ),
        ));
    }

    Ok(DecodedPlane {
        width,
        height,
        depth,
        samples_per_pixel,
        data,
    })
}

fn plane_to_image(plane: &DecodedPlane, data: Vec<f32>, pixel_size: f64) -> QuantResult<Image2D> {
    Image2D::new(plane.width, plane.height, plane.depth, pixel_size, data)
}

/// 从ImageJ元数据解析像素尺寸（µm/px）
///
/// 只有描述声明微米单位时才信任XResolution（每单位像素数）。
pub fn parse_calibration(description: Option<&str>, x_resolution: Option<Value>) -> Option<f64> {
    let unit = description?
        .lines()
        .find_map(|line| line.trim().strip_prefix("unit="))?
        .trim();
    if !MICRON_UNITS.contains(&unit) {
        return None;
    }

    let pixels_per_unit = match x_resolution? {
        Value::Rational(n, d) if d != 0 => f64::from(n) / f64::from(d),
        Value::Float(v) => f64::from(v),
        Value::Double(v) => v,
        _ => return None,
    };

    (pixels_per_unit.is_finite() && pixels_per_unit > 0.0).then(|| 1.0 / pixels_per_unit)
}
