//! 结果持久化接口
//!
//! 批处理驱动只依赖这个接口；写到哪里、用什么格式由实现决定。
//! 失败（磁盘满、无权限）必须以错误返回，不能静默吞掉。

use super::table::ResultTable;
use crate::error::QuantResult;
use crate::image::Image2D;

/// 输出位置（每类结果一个目录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSlot {
    /// 原始荧光图像
    Fluorescence,
    /// 明场/相差参考图像
    Reference,
    /// 二值掩膜
    Drawing,
    /// 单图像测量表
    ImageTable,
    /// 批处理汇总表
    Summary,
}

impl OutputSlot {
    pub fn display_name(&self) -> &'static str {
        match self {
            OutputSlot::Fluorescence => "荧光图像 / Fluorescence",
            OutputSlot::Reference => "参考图像 / Reference",
            OutputSlot::Drawing => "掩膜 / Mask",
            OutputSlot::ImageTable => "测量表 / Measurements",
            OutputSlot::Summary => "汇总表 / Summary",
        }
    }
}

/// 结果持久化器
pub trait ResultPersister: Send + Sync {
    /// 保存表格
    fn save_table(&self, table: &ResultTable, slot: OutputSlot, name: &str) -> QuantResult<()>;

    /// 保存图像
    fn save_image(&self, image: &Image2D, slot: OutputSlot, name: &str) -> QuantResult<()>;
}
