//! 日志初始化
//!
//! 库代码只通过 `log` 门面输出；二进制程序在启动时初始化 flexi_logger（stderr）。
//! `RUST_LOG` 环境变量优先于命令行给出的级别。

use crate::error::{QuantError, QuantResult};
use flexi_logger::{Logger, LoggerHandle, WriteMode};

/// 按 verbose 标志选择默认级别
#[inline]
pub fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// 初始化日志；返回的句柄需要保持到程序结束
pub fn setup_logging(verbose: bool) -> QuantResult<LoggerHandle> {
    Logger::try_with_env_or_str(default_level(verbose))
        .map_err(|e| QuantError::InvalidConfig(format!("日志级别无效: {e}")))?
        .log_to_stderr()
        .write_mode(WriteMode::Direct)
        .start()
        .map_err(|e| QuantError::ResourceError(format!("日志初始化失败: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }
}
