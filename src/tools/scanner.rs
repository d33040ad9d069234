//! 文件扫描模块
//!
//! 负责扫描源目录中的双通道图像文件。

use super::cli::AppConfig;
use super::utils;
use crate::error::{QuantError, QuantResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 扫描目录中的图像文件
///
/// 结果按文件名字典序排列；`recursive` 为假时只看目录本身。
pub fn scan_image_files(
    dir_path: &Path,
    extensions: &[String],
    recursive: bool,
) -> QuantResult<Vec<PathBuf>> {
    if !dir_path.exists() {
        return Err(QuantError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("目录不存在: {}", dir_path.display()),
        )));
    }

    if !dir_path.is_dir() {
        return Err(QuantError::InvalidConfig(format!(
            "路径不是目录: {}",
            dir_path.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut image_files = Vec::new();

    for entry in WalkDir::new(dir_path).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            QuantError::IoError(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("目录遍历失败")),
            )
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if utils::has_extension(path, extensions) {
            image_files.push(path.to_path_buf());
        }
    }

    image_files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

    Ok(image_files)
}

/// 显示文件扫描结果
pub fn show_scan_results(config: &AppConfig, image_files: &[PathBuf]) {
    if image_files.is_empty() {
        println!(
            "[WARNING] 在目录 {} 中没有找到图像文件 / No image files found",
            config.source_dir.display()
        );
        println!(
            "   支持的扩展名 / Extensions: {}",
            config.extensions.join(", ").to_uppercase()
        );
        return;
    }

    println!("[INFO] 扫描目录 / Scanning: {}", config.source_dir.display());
    println!(
        "[INFO] 找到 {} 个图像文件 / Found {} image files",
        image_files.len(),
        image_files.len()
    );

    if config.verbose {
        for (i, file) in image_files.iter().enumerate() {
            println!("   {}. {}", i + 1, utils::extract_filename_lossy(file));
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "condensate_scanner_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = temp_dir("filter");
        for name in ["b.tif", "a.TIFF", "c.png", "notes.txt"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("0.tif"), b"x").unwrap();

        let exts = vec!["tif".to_string(), "tiff".to_string()];
        let flat = scan_image_files(&dir, &exts, false).unwrap();
        let names: Vec<String> = flat.iter().map(|p| utils::extract_filename_lossy(p)).collect();
        assert_eq!(names, vec!["a.TIFF", "b.tif"]);

        let deep = scan_image_files(&dir, &exts, true).unwrap();
        assert_eq!(deep.len(), 3);
        assert_eq!(utils::extract_filename_lossy(&deep[0]), "0.tif");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_scan_missing_dir_is_io_error() {
        let missing = std::env::temp_dir().join("condensate_scanner_definitely_missing");
        let result = scan_image_files(&missing, &["tif".to_string()], false);
        assert!(matches!(result, Err(QuantError::IoError(_))));
    }
}
