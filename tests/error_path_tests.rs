//! 错误路径和异常场景测试
//!
//! 验证：坏文件被记录并跳过、批处理继续；持久化失败被上报而不是吞掉；
//! 配置错误在处理任何文件之前即被拒绝。

mod image_test_fixtures;

use condensate_meter::core::SizeFilter;
use condensate_meter::error::{ErrorCategory, QuantError, QuantResult};
use condensate_meter::image::{Image2D, TiffChannelLoader};
use condensate_meter::processing::{
    AnalysisConfig, BatchDriver, CancelToken, DateTag, ExecutionMode, OutputSlot,
    ResultPersister, ResultTable,
};
use condensate_meter::tools;
use image_test_fixtures::{log, stage_source_dir};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 只记录调用次数的持久化器
#[derive(Default)]
struct CountingPersister {
    tables: AtomicUsize,
    images: AtomicUsize,
}

impl ResultPersister for CountingPersister {
    fn save_table(&self, _table: &ResultTable, _slot: OutputSlot, _name: &str) -> QuantResult<()> {
        self.tables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_image(&self, _image: &Image2D, _slot: OutputSlot, _name: &str) -> QuantResult<()> {
        self.images.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 图像写入总是失败（模拟磁盘满）
struct FullDiskPersister;

impl ResultPersister for FullDiskPersister {
    fn save_table(&self, _table: &ResultTable, slot: OutputSlot, name: &str) -> QuantResult<()> {
        if slot == OutputSlot::Summary {
            Ok(())
        } else {
            Err(QuantError::PersistError(format!("{name}: no space left on device")))
        }
    }

    fn save_image(&self, _image: &Image2D, _slot: OutputSlot, name: &str) -> QuantResult<()> {
        Err(QuantError::PersistError(format!("{name}: no space left on device")))
    }
}

#[test]
fn test_corrupt_files_are_skipped_and_batch_continues() {
    log("坏文件被跳过，批处理继续", "Corrupt files are skipped, batch continues");

    let source = stage_source_dir(
        "corrupt",
        &[
            ("not_a_tiff.tif", "a_corrupt.tif"),
            ("spots_two_page.tif", "b_good.tif"),
            ("single_channel.tif", "c_single.tif"),
            ("mismatched_pages.tif", "d_mismatch.tif"),
            ("flat_two_page.tif", "e_flat.tif"),
        ],
    );
    let files = tools::scan_image_files(&source, &["tif".to_string()], false).unwrap();
    assert_eq!(files.len(), 5);

    let config = AnalysisConfig::default();
    let date = DateTag::new("d");
    let loader = TiffChannelLoader::new(config.fallback_pixel_size);

    for mode in [ExecutionMode::Serial, ExecutionMode::Parallel(3)] {
        let persister = CountingPersister::default();
        let outcome = BatchDriver::new(&config, &date, &loader, &persister)
            .with_mode(mode)
            .run(&files)
            .unwrap();

        assert_eq!(outcome.stats.processed, 2, "{mode:?}");
        assert_eq!(outcome.stats.failed, 3, "{mode:?}");
        assert_eq!(outcome.stats.error_stats[&ErrorCategory::Image].len(), 3);

        let names: Vec<&str> = outcome
            .table
            .rows()
            .iter()
            .map(|r| r.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["b_good", "e_flat"]);

        // 每个成功文件：1张表 + 3张图；最后1张汇总表
        assert_eq!(persister.tables.load(Ordering::SeqCst), 3);
        assert_eq!(persister.images.load(Ordering::SeqCst), 6);
        println!("  ✓ {mode:?}: 2 成功，3 跳过 / 2 processed, 3 skipped");
    }

    let _ = std::fs::remove_dir_all(&source);
}

#[test]
fn test_persist_failures_are_reported_not_swallowed() {
    let source = stage_source_dir("full_disk", &[("spots_two_page.tif", "cells.tif")]);
    let files = tools::scan_image_files(&source, &["tif".to_string()], false).unwrap();

    let config = AnalysisConfig::default();
    let date = DateTag::new("d");
    let loader = TiffChannelLoader::new(config.fallback_pixel_size);

    let outcome = BatchDriver::new(&config, &date, &loader, &FullDiskPersister)
        .run(&files)
        .unwrap();

    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.error_stats[&ErrorCategory::Persist], vec!["cells"]);
    assert!(outcome.table.is_empty());
    println!("  ✓ 写入失败计入失败统计 / persist failure counted as failed file");

    let _ = std::fs::remove_dir_all(&source);
}

#[test]
fn test_summary_persist_failure_fails_the_batch() {
    struct SummaryFails;
    impl ResultPersister for SummaryFails {
        fn save_table(&self, _t: &ResultTable, slot: OutputSlot, _n: &str) -> QuantResult<()> {
            match slot {
                OutputSlot::Summary => Err(QuantError::PersistError("read-only".into())),
                _ => Ok(()),
            }
        }
        fn save_image(&self, _i: &Image2D, _s: OutputSlot, _n: &str) -> QuantResult<()> {
            Ok(())
        }
    }

    let config = AnalysisConfig::default();
    let date = DateTag::new("d");
    let loader = TiffChannelLoader::new(config.fallback_pixel_size);
    let result = BatchDriver::new(&config, &date, &loader, &SummaryFails).run(&[]);
    assert!(matches!(result, Err(QuantError::PersistError(_))));
}

#[test]
fn test_invalid_config_is_rejected_before_processing() {
    let mut config = AnalysisConfig::default();
    config.size_filter = SizeFilter::new(-1.0, 500.0);
    let err = config.validate().unwrap_err();
    assert_eq!(ErrorCategory::from_quant_error(&err), ErrorCategory::Config);

    let app = tools::parse_args_from(["condensate-meter", "/data", "-d", "d", "--pixel-size", "0"])
        .unwrap();
    assert!(matches!(app.validate(), Err(QuantError::InvalidConfig(_))));

    assert!(tools::parse_args_from(["condensate-meter", "/data", "--min-area", "abc"]).is_err());
    println!("  ✓ 配置错误在启动时被拒绝 / bad configuration rejected at startup");
}

#[test]
fn test_cancelled_batch_keeps_completed_rows_only() {
    let source = stage_source_dir(
        "cancel",
        &[("flat_two_page.tif", "a.tif"), ("flat_two_page.tif", "b.tif")],
    );
    let files = tools::scan_image_files(&source, &["tif".to_string()], false).unwrap();

    let config = AnalysisConfig::default();
    let date = DateTag::new("d");
    let loader = TiffChannelLoader::new(config.fallback_pixel_size);
    let token = CancelToken::new();
    token.cancel();

    let outcome = BatchDriver::new(&config, &date, &loader, &CountingPersister::default())
        .with_mode(ExecutionMode::Parallel(2))
        .with_cancel_token(token)
        .run(&files)
        .unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.table.is_empty());
    assert_eq!(outcome.stats.failed, 0, "取消不计为失败 / cancellation is not a failure");

    let _ = std::fs::remove_dir_all(&source);
}
