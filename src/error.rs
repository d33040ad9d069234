//! 统一错误处理框架
//!
//! 定量流程的错误分类：图像无效、图像不可读、配置错误、I/O与持久化失败。
//! 零方差图像、零颗粒图像属于正常结果，以哨兵数据表示，不在此列。

use std::fmt;
use std::io;

/// 凝聚体定量相关的统一错误类型
#[derive(Debug)]
pub enum QuantError {
    /// 图像尺寸/标定无效（非正尺寸、通道尺寸不一致、像素尺寸非正）
    InvalidImage(String),

    /// 图像文件损坏或格式不受支持（加载器失败）
    UnreadableImage(String),

    /// 配置错误 - 启动阶段即致命
    InvalidConfig(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 结果持久化失败（表格或图像写入）
    PersistError(String),

    /// 资源访问错误（线程池等）
    ResourceError(String),

    /// 批处理在文件之间被取消
    Cancelled,
}

impl fmt::Display for QuantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantError::InvalidImage(msg) => write!(f, "图像无效: {msg}"),
            QuantError::UnreadableImage(msg) => write!(f, "图像无法读取: {msg}"),
            QuantError::InvalidConfig(msg) => write!(f, "配置无效: {msg}"),
            QuantError::IoError(err) => write!(f, "文件I/O错误: {err}"),
            QuantError::PersistError(msg) => write!(f, "结果保存失败: {msg}"),
            QuantError::ResourceError(msg) => write!(f, "资源访问错误: {msg}"),
            QuantError::Cancelled => write!(f, "批处理已取消"),
        }
    }
}

impl std::error::Error for QuantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuantError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for QuantError {
    fn from(err: io::Error) -> Self {
        QuantError::IoError(err)
    }
}

impl From<tiff::TiffError> for QuantError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(io_err) => QuantError::IoError(io_err),
            other => QuantError::UnreadableImage(format!("TIFF解码错误: {other}")),
        }
    }
}

/// 定量操作的标准Result类型
pub type QuantResult<T> = Result<T, QuantError>;

// ==================== 错误转换Helper函数 ====================

/// 创建图像无效错误的helper函数
#[inline]
pub fn invalid_image_error<E: fmt::Display>(context: &str, err: E) -> QuantError {
    QuantError::InvalidImage(format!("{context}: {err}"))
}

/// 创建图像不可读错误的helper函数
#[inline]
pub fn unreadable_error<E: fmt::Display>(context: &str, err: E) -> QuantError {
    QuantError::UnreadableImage(format!("{context}: {err}"))
}

/// 创建持久化错误的helper函数
#[inline]
pub fn persist_error<E: fmt::Display>(context: &str, err: E) -> QuantError {
    QuantError::PersistError(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的错误统计和分析

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ErrorCategory {
    /// 图像相关错误（损坏、格式不支持、尺寸无效）
    Image,
    /// I/O相关错误（文件不存在、权限不足等）
    Io,
    /// 配置错误
    Config,
    /// 结果写入失败
    Persist,
    /// 其他未分类错误
    Other,
}

impl ErrorCategory {
    /// 从QuantError提取错误类别
    pub fn from_quant_error(e: &QuantError) -> Self {
        match e {
            QuantError::InvalidImage(_) | QuantError::UnreadableImage(_) => Self::Image,
            QuantError::IoError(_) => Self::Io,
            QuantError::InvalidConfig(_) => Self::Config,
            QuantError::PersistError(_) => Self::Persist,
            QuantError::ResourceError(_) | QuantError::Cancelled => Self::Other,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Image => "图像错误",
            Self::Io => "I/O错误",
            Self::Config => "配置错误",
            Self::Persist => "保存错误",
            Self::Other => "其他错误",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            ErrorCategory::from_quant_error(&QuantError::InvalidImage("0x0".into())),
            ErrorCategory::Image
        );
        assert_eq!(
            ErrorCategory::from_quant_error(&QuantError::UnreadableImage("bad".into())),
            ErrorCategory::Image
        );
        assert_eq!(
            ErrorCategory::from_quant_error(&QuantError::PersistError("disk full".into())),
            ErrorCategory::Persist
        );
        assert_eq!(
            ErrorCategory::from_quant_error(&QuantError::Cancelled),
            ErrorCategory::Other
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err: QuantError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(matches!(err, QuantError::IoError(_)));
    }

    #[test]
    fn test_helper_formats_context() {
        let err = unreadable_error("a.tif", "truncated strip");
        assert_eq!(err.to_string(), "图像无法读取: a.tif: truncated strip");
    }
}
