//! 文件系统持久化器
//!
//! 表格写为CSV（可选同名JSON），图像写为TIFF，按输出位置分目录存放。

use super::formatter;
use super::layout::OutputLayout;
use crate::error::{QuantResult, persist_error};
use crate::image::{Image2D, write_tiff};
use crate::processing::{OutputSlot, ResultPersister, ResultTable};
use std::fs;

/// 写入 `OutputLayout` 目录结构的持久化器
#[derive(Debug, Clone)]
pub struct FsPersister {
    layout: OutputLayout,
    write_json: bool,
}

impl FsPersister {
    /// 创建持久化器并建立全部输出目录
    pub fn create(layout: OutputLayout, write_json: bool) -> QuantResult<Self> {
        layout.create_all()?;
        Ok(Self { layout, write_json })
    }

    #[inline]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}

impl ResultPersister for FsPersister {
    fn save_table(&self, table: &ResultTable, slot: OutputSlot, name: &str) -> QuantResult<()> {
        let csv_path = self.layout.path_for(slot, name, "csv");
        formatter::write_csv(table, &csv_path)
            .map_err(|e| persist_error(&csv_path.display().to_string(), e))?;

        if self.write_json {
            let json_path = self.layout.path_for(slot, name, "json");
            let json = serde_json::to_string_pretty(&table.to_json())
                .map_err(|e| persist_error(&json_path.display().to_string(), e))?;
            fs::write(&json_path, json)
                .map_err(|e| persist_error(&json_path.display().to_string(), e))?;
        }

        log::debug!("{} -> {}", slot.display_name(), csv_path.display());
        Ok(())
    }

    fn save_image(&self, image: &Image2D, slot: OutputSlot, name: &str) -> QuantResult<()> {
        let path = self.layout.path_for(slot, name, "tif");
        write_tiff(&path, &[image])?;
        log::debug!("{} -> {}", slot.display_name(), path.display());
        Ok(())
    }
}
