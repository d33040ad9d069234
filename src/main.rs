//! Condensate Meter - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成批量定量任务。

use condensate_meter::{
    error::{ErrorCategory, QuantError},
    image::TiffChannelLoader,
    processing::{BatchDriver, BatchOutcome, ExecutionMode},
    tools::{self, AppConfig, FsPersister, OutputLayout},
};
use std::path::PathBuf;
use std::process;

/// 错误退出码定义
mod exit_codes {
    /// 通用错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 配置/参数错误
    pub const CONFIG_ERROR: i32 = 2;
    /// 图像无效或无法读取
    pub const IMAGE_ERROR: i32 = 3;
    /// 结果写入失败
    pub const PERSIST_ERROR: i32 = 4;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 5;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &QuantError) -> &'static str {
    match error {
        QuantError::ResourceError(_) => {
            "资源不可用，请检查系统资源或重试；若持续失败请使用 --serial / Resource unavailable, retry or use --serial"
        }
        QuantError::Cancelled => "批处理被取消 / Batch was cancelled",
        _ => match ErrorCategory::from_quant_error(error) {
            ErrorCategory::Config => {
                "检查命令行参数是否正确，使用 --help 查看完整用法 / Check command-line arguments, use --help to see full usage"
            }
            ErrorCategory::Io => {
                "检查目录路径是否正确，是否存在且可读 / Check that the directory exists and is readable"
            }
            ErrorCategory::Image => {
                "确保输入为双通道TIFF（两页或两个样本） / Ensure inputs are two-channel TIFF files"
            }
            ErrorCategory::Persist => {
                "检查输出目录的磁盘空间和写权限 / Check free disk space and write permission of the output directory"
            }
            ErrorCategory::Other => "请检查输入文件和参数设置 / Please check input files and parameters",
        },
    }
}

/// 错误处理和建议
fn handle_error(error: QuantError) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error}");

    let category = ErrorCategory::from_quant_error(&error);
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(&error));

    let exit_code = match &error {
        QuantError::ResourceError(_) => exit_codes::RESOURCE_ERROR,
        _ => match category {
            ErrorCategory::Config => exit_codes::CONFIG_ERROR,
            ErrorCategory::Image => exit_codes::IMAGE_ERROR,
            ErrorCategory::Persist => exit_codes::PERSIST_ERROR,
            ErrorCategory::Io | ErrorCategory::Other => exit_codes::GENERAL_ERROR,
        },
    };

    process::exit(exit_code);
}

/// 运行一次批处理驱动
fn run_driver(
    config: &AppConfig,
    persister: &FsPersister,
    image_files: &[PathBuf],
    mode: ExecutionMode,
) -> Result<BatchOutcome, QuantError> {
    let analysis = config.analysis_config();
    let loader = TiffChannelLoader::new(config.pixel_size);

    BatchDriver::new(&analysis, &config.date, &loader, persister)
        .with_mode(mode)
        .run(image_files)
}

/// 批量处理源目录
fn process_batch(config: &AppConfig) -> Result<(), QuantError> {
    let image_files =
        tools::scan_image_files(&config.source_dir, &config.extensions, config.recursive)?;
    tools::show_scan_results(config, &image_files);

    let layout = OutputLayout::new(&config.dest_dir, &config.date);
    let persister = FsPersister::create(layout, config.json)?;

    let mode = match config.execution_mode() {
        ExecutionMode::Parallel(degree) => {
            let actual =
                tools::utils::effective_parallel_degree(degree, Some(image_files.len()));
            if actual == 1 {
                if config.verbose {
                    println!("[INFO] 并发度为1，使用串行模式 / Parallelism=1, using serial mode");
                }
                ExecutionMode::Serial
            } else {
                ExecutionMode::Parallel(actual)
            }
        }
        ExecutionMode::Serial => ExecutionMode::Serial,
    };

    let outcome = match run_driver(config, &persister, &image_files, mode) {
        Err(QuantError::ResourceError(e)) if mode != ExecutionMode::Serial => {
            eprintln!(
                "[WARNING] 并行处理失败 / Parallel processing failed: {e}，回退到串行模式 / fallback to serial"
            );
            run_driver(config, &persister, &image_files, ExecutionMode::Serial)?
        }
        other => other?,
    };

    tools::show_batch_completion_info(&outcome, persister.layout(), config.verbose);
    Ok(())
}

/// 应用程序主逻辑（便于测试和复用）
fn run() -> Result<(), QuantError> {
    // 1. 解析命令行参数
    let config = tools::parse_args();

    // 2. 初始化日志（句柄保持到run结束）
    let _logger = tools::setup_logging(config.verbose)?;

    // 3. 显示启动信息，并在处理任何文件之前校验配置
    tools::show_startup_info(&config);
    config.validate()?;

    // 4. 批处理
    process_batch(&config)?;

    tools::show_completion_info(&config);
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        handle_error(error);
    }
}
