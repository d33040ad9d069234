//! 图像测试固件生成器
//!
//! 生成确定性的双通道TIFF固件（多页16位、单页RGB交错、单通道、尺寸不一致、伪TIFF）

#![allow(dead_code)]

use condensate_meter::image::{BitDepth, Image2D, write_tiff};
use fs2::FileExt;
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tiff::encoder::{TiffEncoder, colortype};

pub fn log(msg_zh: impl AsRef<str>, msg_en: impl AsRef<str>) {
    println!("{} / {}", msg_zh.as_ref(), msg_en.as_ref());
}

/// 标定固件的像素尺寸（µm）
pub const CALIBRATED_PIXEL_SIZE: f64 = 0.1;

/// 两页固件中的亮斑（x0, y0, 边长）
pub const SPOTS: [(usize, usize, usize); 2] = [(12, 12, 5), (40, 30, 4)];

/// 亮斑强度
pub const SPOT_INTENSITY: f32 = 2000.0;

fn fixtures_base_dir() -> &'static PathBuf {
    static ROOT: OnceLock<PathBuf> = OnceLock::new();
    ROOT.get_or_init(|| {
        let path = std::env::var("CONDENSATE_FIXTURES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tests/fixtures"));
        create_dir_all(&path).expect("无法创建测试固件目录");
        path
    })
}

/// 公开获取固件根目录
pub fn fixtures_dir() -> PathBuf {
    fixtures_base_dir().clone()
}

/// 获取特定固件文件路径
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_base_dir().join(name)
}

/// 确保所有固件生成完毕（幂等）
pub fn ensure_fixtures_generated() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        ImageTestFixtures::new().generate_all();
    });
}

/// 跨进程文件锁 + 进程内互斥，避免并发写入导致的截断文件。
struct FixtureLock {
    _mutex_guard: std::sync::MutexGuard<'static, ()>,
    lock_file: File,
}

impl FixtureLock {
    fn acquire() -> Self {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        let mutex = MUTEX.get_or_init(|| Mutex::new(()));
        let guard = mutex.lock().expect("Fixture mutex poisoned");

        let lock_path = fixtures_base_dir().join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .expect("无法创建固件锁文件");
        file.lock_exclusive()
            .expect("无法获取固件文件锁，可能被其他进程占用");

        Self {
            _mutex_guard: guard,
            lock_file: file,
        }
    }
}

impl Drop for FixtureLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.lock_file);
    }
}

/// 带亮斑的16位荧光图（64x64，背景100-104）
pub fn spots_fluorescence() -> Image2D {
    Image2D::from_fn(64, 64, BitDepth::Gray16, CALIBRATED_PIXEL_SIZE, |x, y| {
        let in_spot = SPOTS
            .iter()
            .any(|&(x0, y0, side)| (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y));
        if in_spot {
            SPOT_INTENSITY
        } else {
            100.0 + ((x * 7 + y * 13) % 5) as f32
        }
    })
    .expect("无法创建荧光图")
}

/// 测试固件生成器
pub struct ImageTestFixtures {
    fixtures_dir: PathBuf,
}

impl ImageTestFixtures {
    pub fn new() -> Self {
        Self {
            fixtures_dir: fixtures_dir(),
        }
    }

    pub fn get_path(&self, filename: &str) -> PathBuf {
        self.fixtures_dir.join(filename)
    }

    /// 生成所有测试固件
    pub fn generate_all(&self) {
        let _guard = FixtureLock::acquire();

        log("开始生成图像测试固件...", "Generating image test fixtures...");

        self.create_spots_two_page();
        self.create_flat_two_page();
        self.create_rgb_interleaved();
        self.create_single_channel();
        self.create_mismatched_pages();
        self.create_fake_tiff();

        log(
            format!("所有测试固件已生成到: {:?}", self.fixtures_dir),
            format!("All fixtures generated at: {:?}", self.fixtures_dir),
        );
    }

    /// 1. 两页16位、ImageJ标定、两个亮斑
    pub fn create_spots_two_page(&self) -> PathBuf {
        let path = self.get_path("spots_two_page.tif");
        let fluorescence = spots_fluorescence();
        let reference = Image2D::from_fn(64, 64, BitDepth::Gray16, CALIBRATED_PIXEL_SIZE, |x, _| {
            500.0 + x as f32
        })
        .expect("无法创建参考图");
        write_tiff(&path, &[&fluorescence, &reference]).expect("无法写入两页固件");
        log(
            "  生成 spots_two_page.tif (2 页, 2 个亮斑)",
            "  Generated spots_two_page.tif (2 pages, 2 spots)",
        );
        path
    }

    /// 2. 两页恒定强度（零方差）
    pub fn create_flat_two_page(&self) -> PathBuf {
        let path = self.get_path("flat_two_page.tif");
        let flat = Image2D::filled(32, 32, BitDepth::Gray16, CALIBRATED_PIXEL_SIZE, 100.0)
            .expect("无法创建恒定图");
        write_tiff(&path, &[&flat, &flat]).expect("无法写入恒定固件");
        log(
            "  生成 flat_two_page.tif (零方差)",
            "  Generated flat_two_page.tif (zero variance)",
        );
        path
    }

    /// 3. 单页RGB交错、无标定：R=荧光（3x3亮斑），G=参考
    pub fn create_rgb_interleaved(&self) -> PathBuf {
        let path = self.get_path("rgb_interleaved.tif");
        let (width, height) = (32u32, 32u32);
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let spot = (15..18).contains(&x) && (15..18).contains(&y);
                data.push(if spot { 200u8 } else { 10 + ((x + y) % 3) as u8 });
                data.push(50u8);
                data.push(0u8);
            }
        }
        write_raw(&path, |encoder| {
            encoder.write_image::<colortype::RGB8>(width, height, &data)
        });
        log(
            "  生成 rgb_interleaved.tif (单页RGB)",
            "  Generated rgb_interleaved.tif (single-page RGB)",
        );
        path
    }

    /// 4. 单页单通道（缺少参考通道）
    pub fn create_single_channel(&self) -> PathBuf {
        let path = self.get_path("single_channel.tif");
        let data = vec![7u8; 16 * 16];
        write_raw(&path, |encoder| {
            encoder.write_image::<colortype::Gray8>(16, 16, &data)
        });
        log(
            "  生成 single_channel.tif (仅一个通道)",
            "  Generated single_channel.tif (one channel only)",
        );
        path
    }

    /// 5. 两页尺寸不一致
    pub fn create_mismatched_pages(&self) -> PathBuf {
        let path = self.get_path("mismatched_pages.tif");
        let large = Image2D::filled(32, 32, BitDepth::Gray16, CALIBRATED_PIXEL_SIZE, 10.0)
            .expect("无法创建图像");
        let small = Image2D::filled(16, 16, BitDepth::Gray16, CALIBRATED_PIXEL_SIZE, 10.0)
            .expect("无法创建图像");
        write_tiff(&path, &[&large, &small]).expect("无法写入尺寸不一致固件");
        log(
            "  生成 mismatched_pages.tif (32x32 + 16x16)",
            "  Generated mismatched_pages.tif (32x32 + 16x16)",
        );
        path
    }

    /// 6. 伪装成TIFF的文本文件
    pub fn create_fake_tiff(&self) -> PathBuf {
        let path = self.get_path("not_a_tiff.tif");
        let mut file = File::create(&path).expect("无法创建伪TIFF");
        file.write_all(b"This is not a TIFF file")
            .expect("无法写入伪TIFF");
        log(
            "  生成 not_a_tiff.tif (文本内容)",
            "  Generated not_a_tiff.tif (text content)",
        );
        path
    }
}

fn write_raw<F>(path: &Path, write: F)
where
    F: FnOnce(&mut TiffEncoder<&mut BufWriter<File>>) -> tiff::TiffResult<()>,
{
    let file = File::create(path).expect("无法创建固件文件");
    let mut writer = BufWriter::new(file);
    {
        let mut encoder = TiffEncoder::new(&mut writer).expect("无法创建TIFF编码器");
        write(&mut encoder).expect("无法写入TIFF");
    }
    writer.flush().expect("无法刷新固件文件");
}

/// 把固件复制到独立的临时源目录（批处理测试使用）
pub fn stage_source_dir(tag: &str, names: &[(&str, &str)]) -> PathBuf {
    ensure_fixtures_generated();
    let dir = std::env::temp_dir().join(format!(
        "condensate_{tag}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    create_dir_all(&dir).expect("无法创建临时源目录");
    for (fixture, staged) in names {
        std::fs::copy(fixture_path(fixture), dir.join(staged)).expect("无法复制固件");
    }
    dir
}
