//! 工具模块集合
//!
//! 包含CLI、文件扫描、输出目录、持久化、格式化等工具模块，支持main.rs的流程控制。

pub mod cli;
pub mod constants;
pub mod formatter;
pub mod fs_persister;
pub mod layout;
pub mod logging;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use cli::{AppConfig, parse_args, parse_args_from, show_completion_info, show_startup_info};
pub use formatter::{render_summary_table, show_batch_completion_info, write_csv};
pub use fs_persister::FsPersister;
pub use layout::OutputLayout;
pub use logging::setup_logging;
pub use scanner::{scan_image_files, show_scan_results};
pub use utils::path;
