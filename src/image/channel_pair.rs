//! 双通道图像对
//!
//! 荧光通道与明场/相差参考通道，像素对齐、尺寸一致、共享同一标定。

use super::format::Image2D;
use crate::error::{self, QuantResult};
use std::path::Path;

/// 一个输入文件对应的通道对
#[derive(Debug, Clone)]
pub struct ChannelPair {
    fluorescence: Image2D,
    reference: Image2D,
    pixel_size_microns: f64,
    id: String,
}

impl ChannelPair {
    /// 创建通道对：两通道必须同尺寸，像素尺寸必须为正
    ///
    /// 两个通道都会被重新标定为 `pixel_size_microns`。
    pub fn new(
        fluorescence: Image2D,
        reference: Image2D,
        pixel_size_microns: f64,
        id: impl Into<String>,
    ) -> QuantResult<Self> {
        if !fluorescence.same_dimensions(&reference) {
            return Err(error::invalid_image_error(
                "荧光通道与参考通道尺寸不一致",
                format!(
                    "{}x{} vs {}x{}",
                    fluorescence.width(),
                    fluorescence.height(),
                    reference.width(),
                    reference.height()
                ),
            ));
        }

        let fluorescence = fluorescence.with_pixel_size(pixel_size_microns)?;
        let reference = reference.with_pixel_size(pixel_size_microns)?;

        Ok(Self {
            fluorescence,
            reference,
            pixel_size_microns,
            id: id.into(),
        })
    }

    #[inline]
    pub fn fluorescence(&self) -> &Image2D {
        &self.fluorescence
    }

    #[inline]
    pub fn reference(&self) -> &Image2D {
        &self.reference
    }

    #[inline]
    pub fn pixel_size_microns(&self) -> f64 {
        self.pixel_size_microns
    }

    /// 稳定标识（文件名主干）
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// 通道对加载器（外部协作者接口）
///
/// 实现必须保证两个通道像素对齐且尺寸一致；
/// 损坏或不支持的文件返回 `UnreadableImage`。
pub trait ChannelPairLoader: Send + Sync {
    fn load(&self, path: &Path) -> QuantResult<ChannelPair>;
}

/// 从路径提取文件标识：文件名中第一个 `.` 之前的部分
///
/// `cells_01.ome.tif` → `cells_01`
pub fn file_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuantError;
    use crate::image::BitDepth;

    #[test]
    fn test_mismatched_channels_rejected() {
        let a = Image2D::filled(8, 8, BitDepth::Gray16, 0.1, 1.0).unwrap();
        let b = Image2D::filled(8, 9, BitDepth::Gray16, 0.1, 1.0).unwrap();
        let result = ChannelPair::new(a, b, 0.1, "x");
        assert!(matches!(result, Err(QuantError::InvalidImage(_))));
    }

    #[test]
    fn test_pair_recalibrates_both_channels() {
        let a = Image2D::filled(4, 4, BitDepth::Gray8, 1.0, 1.0).unwrap();
        let b = Image2D::filled(4, 4, BitDepth::Gray8, 1.0, 2.0).unwrap();
        let pair = ChannelPair::new(a, b, 0.065, "sample").unwrap();
        assert_eq!(pair.fluorescence().pixel_size(), 0.065);
        assert_eq!(pair.reference().pixel_size(), 0.065);
        assert_eq!(pair.id(), "sample");
    }

    #[test]
    fn test_file_id_stops_at_first_dot() {
        assert_eq!(file_id(Path::new("/data/cells_01.ome.tif")), "cells_01");
        assert_eq!(file_id(Path::new("plain.tif")), "plain");
        assert_eq!(file_id(Path::new(".hidden.tif")), ".hidden.tif");
    }
}
