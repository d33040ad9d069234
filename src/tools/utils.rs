//! 工具函数模块
//!
//! 文件路径处理、并发度计算等通用工具函数。

use super::constants::parallel_limits;

/// 文件路径处理工具函数
pub mod path {
    use std::path::Path;

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 扩展名是否在允许列表中（大小写不敏感）
    pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }
}

/// 计算实际并发度
///
/// 请求值被限制在 [MIN, MAX]，且不超过文件数（文件数未知时不限制）。
pub fn effective_parallel_degree(requested: usize, file_count: Option<usize>) -> usize {
    let degree = requested.clamp(
        parallel_limits::MIN_PARALLEL_DEGREE,
        parallel_limits::MAX_PARALLEL_DEGREE,
    );
    match file_count {
        Some(0) | None => degree,
        Some(n) => degree.min(n),
    }
}

// 重新导出为平级函数
pub use path::{extract_filename_lossy, has_extension};
