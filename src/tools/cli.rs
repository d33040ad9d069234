//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。

use super::constants::{analysis, defaults};
use crate::core::{EdgePolicy, SizeFilter};
use crate::error::{QuantError, QuantResult};
use crate::processing::{AnalysisConfig, DateTag, ExecutionMode};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 源目录（双通道TIFF）
    pub source_dir: PathBuf,

    /// 输出目录（默认与源目录相同）
    pub dest_dir: PathBuf,

    /// 实验日期标签
    pub date: DateTag,

    /// 文件无标定时使用的像素尺寸（µm/px）
    pub pixel_size: f64,

    pub rolling_radius: f64,
    pub min_area: f64,
    pub max_area: f64,

    /// 是否保留接触图像边界的颗粒
    pub include_edges: bool,

    /// 扫描的文件扩展名（小写，不含点）
    pub extensions: Vec<String>,

    /// 是否递归扫描子目录
    pub recursive: bool,

    /// 多文件并行并发度（None = 串行）
    pub parallel_files: Option<usize>,

    /// 表格同时写出JSON
    pub json: bool,

    /// 是否显示详细信息
    pub verbose: bool,
}

impl AppConfig {
    /// 不可变的分析参数
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            rolling_radius: self.rolling_radius,
            size_filter: SizeFilter::new(self.min_area, self.max_area),
            edge_policy: if self.include_edges {
                EdgePolicy::Include
            } else {
                EdgePolicy::Exclude
            },
            sigma_factor: analysis::SIGMA_FACTOR,
            fallback_pixel_size: self.pixel_size,
        }
    }

    #[inline]
    pub fn execution_mode(&self) -> ExecutionMode {
        match self.parallel_files {
            Some(degree) => ExecutionMode::Parallel(degree),
            None => ExecutionMode::Serial,
        }
    }

    /// 启动时校验（在处理任何文件之前）
    pub fn validate(&self) -> QuantResult<()> {
        self.analysis_config().validate()?;

        let tag = self.date.as_str();
        if tag.trim().is_empty() || tag.contains(['/', '\\']) {
            return Err(QuantError::InvalidConfig(format!(
                "日期标签不能为空或包含路径分隔符: {tag:?}"
            )));
        }
        if self.extensions.is_empty() {
            return Err(QuantError::InvalidConfig("扩展名列表为空".to_string()));
        }
        Ok(())
    }
}

/// 构建命令行定义
pub fn build_command() -> Command {
    Command::new("condensate-meter")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("Condensate Meter Team")
        .arg(
            Arg::new("SOURCE")
                .help("包含双通道TIFF的源目录 / Source directory with two-channel TIFF files")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("输出目录（默认为源目录） / Destination directory (defaults to SOURCE)")
                .value_name("DEST"),
        )
        .arg(
            Arg::new("date")
                .long("date")
                .short('d')
                .help("实验日期标签（默认今天） / Experiment date tag (defaults to today)")
                .value_name("TAG"),
        )
        .arg(
            Arg::new("pixel-size")
                .long("pixel-size")
                .help("文件无标定时的像素尺寸 µm/px / Fallback pixel size in µm/px")
                .value_name("MICRONS")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("rolling-radius")
                .long("rolling-radius")
                .help("滚球背景半径（像素） / Rolling-ball radius in pixels")
                .value_name("PX")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("min-area")
                .long("min-area")
                .help("颗粒面积下界 µm² / Minimum particle area in µm²")
                .value_name("UM2")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("max-area")
                .long("max-area")
                .help("颗粒面积上界 µm² / Maximum particle area in µm²")
                .value_name("UM2")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("include-edges")
                .long("include-edges")
                .help("保留接触图像边界的颗粒 / Keep particles touching the image border")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("extensions")
                .long("extensions")
                .help("扫描的扩展名，逗号分隔 / Comma-separated file extensions")
                .value_name("EXTS")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("recursive")
                .long("recursive")
                .short('r')
                .help("递归扫描子目录 / Scan subdirectories")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("parallel-files")
                .long("parallel-files")
                .help("多文件并行并发度 (1-16) / Number of files processed in parallel")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .conflicts_with("serial"),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .help("串行处理（禁用多文件并行） / Process files one at a time")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("表格同时写出JSON / Also write tables as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / Verbose output")
                .action(ArgAction::SetTrue),
        )
}

fn config_from_matches(matches: &ArgMatches) -> AppConfig {
    let source_dir = matches
        .get_one::<String>("SOURCE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let dest_dir = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| source_dir.clone());
    let date = matches
        .get_one::<String>("date")
        .cloned()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());

    let number = |id: &str, fallback: f64| matches.get_one::<f64>(id).copied().unwrap_or(fallback);

    let extensions = matches
        .get_many::<String>("extensions")
        .map(|values| {
            values
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect()
        })
        .unwrap_or_else(|| defaults::EXTENSIONS.iter().map(|e| e.to_string()).collect());

    let parallel_files = if matches.get_flag("serial") {
        None
    } else {
        Some(
            matches
                .get_one::<usize>("parallel-files")
                .copied()
                .unwrap_or(defaults::PARALLEL_FILES_DEGREE),
        )
    };

    AppConfig {
        source_dir,
        dest_dir,
        date: DateTag::new(date),
        pixel_size: number("pixel-size", defaults::PIXEL_SIZE_MICRONS),
        rolling_radius: number("rolling-radius", defaults::ROLLING_RADIUS),
        min_area: number("min-area", defaults::MIN_PARTICLE_AREA),
        max_area: number("max-area", defaults::MAX_PARTICLE_AREA),
        include_edges: matches.get_flag("include-edges"),
        extensions,
        recursive: matches.get_flag("recursive"),
        parallel_files,
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    }
}

/// 解析命令行参数并创建配置
pub fn parse_args() -> AppConfig {
    config_from_matches(&build_command().get_matches())
}

/// 从给定参数解析（供测试和嵌入使用）
pub fn parse_args_from<I, T>(args: I) -> Result<AppConfig, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    Ok(config_from_matches(&matches))
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("[INFO] Condensate Meter v{VERSION} 启动 / started");
    println!("[INFO] {DESCRIPTION}");
    if config.verbose {
        println!(
            "   日期 / Date: {}  滚球半径 / Rolling radius: {}  面积 / Area: {}-{} µm²",
            config.date.as_str(),
            config.rolling_radius,
            config.min_area,
            config.max_area
        );
        println!(
            "   边界颗粒 / Edge particles: {}  备用像素尺寸 / Fallback pixel size: {} µm",
            if config.include_edges {
                "保留 / include"
            } else {
                "排除 / exclude"
            },
            config.pixel_size
        );
    }
    println!();
}

/// 显示程序完成信息
pub fn show_completion_info(config: &AppConfig) {
    if config.verbose {
        println!("[OK] 所有任务处理完成 / All tasks completed");
    }
}
