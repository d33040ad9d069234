//! TIFF写出
//!
//! 按源位深度写出灰度TIFF，附带ImageJ可识别的标定（XResolution/YResolution + `unit=micron`）。
//! 多个图像写为多页TIFF，页序即通道序。

use super::format::{BitDepth, Image2D};
use crate::error::{self, QuantResult};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tiff::TiffResult;
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{Rational, TiffEncoder, TiffValue};
use tiff::tags::{ResolutionUnit, Tag};

/// 分辨率有理数的分母（像素/µm 保留6位小数）
const RESOLUTION_DENOMINATOR: u32 = 1_000_000;

/// 写出单页或多页TIFF
pub fn write_tiff(path: &Path, pages: &[&Image2D]) -> QuantResult<()> {
    let context = path.display().to_string();
    let file = File::create(path).map_err(|e| error::persist_error(&context, e))?;
    let mut writer = BufWriter::new(file);

    {
        let mut encoder =
            TiffEncoder::new(&mut writer).map_err(|e| error::persist_error(&context, e))?;
        for page in pages {
            write_page(&mut encoder, page).map_err(|e| error::persist_error(&context, e))?;
        }
    }

    writer
        .flush()
        .map_err(|e| error::persist_error(&context, e))
}

fn write_page<W: Write + Seek>(encoder: &mut TiffEncoder<W>, image: &Image2D) -> TiffResult<()> {
    let pixels = image.pixels();
    match image.depth() {
        BitDepth::Gray8 => {
            let data: Vec<u8> = pixels
                .iter()
                .map(|&v| BitDepth::Gray8.quantize(f64::from(v)) as u8)
                .collect();
            write_plane::<_, colortype::Gray8>(encoder, image, &data)
        }
        BitDepth::Gray16 => {
            let data: Vec<u16> = pixels
                .iter()
                .map(|&v| BitDepth::Gray16.quantize(f64::from(v)) as u16)
                .collect();
            write_plane::<_, colortype::Gray16>(encoder, image, &data)
        }
        BitDepth::Gray32Float => write_plane::<_, colortype::Gray32Float>(encoder, image, pixels),
    }
}

fn write_plane<W, C>(
    encoder: &mut TiffEncoder<W>,
    image: &Image2D,
    data: &[C::Inner],
) -> TiffResult<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut page = encoder.new_image::<C>(image.width() as u32, image.height() as u32)?;
    page.encoder()
        .write_tag(Tag::ImageDescription, imagej_description().as_str())?;
    page.resolution(ResolutionUnit::None, pixels_per_micron(image.pixel_size()));
    page.write_data(data)
}

fn imagej_description() -> String {
    "ImageJ=1.53t\nunit=micron\n".to_string()
}

fn pixels_per_micron(pixel_size: f64) -> Rational {
    let ppu = 1.0 / pixel_size;
    Rational {
        n: (ppu * f64::from(RESOLUTION_DENOMINATOR))
            .round()
            .clamp(1.0, f64::from(u32::MAX)) as u32,
        d: RESOLUTION_DENOMINATOR,
    }
}
