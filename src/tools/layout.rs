//! 输出目录结构
//!
//! ```text
//! <dest>/<date>_output/
//!     Green/                   原始荧光图像
//!     BF/                      参考通道图像
//!     Drawings/                二值掩膜
//!     <date>_csv/              单图像测量表
//!     <date>_particle_stat.csv 汇总表
//! ```

use super::constants::layout;
use crate::error::QuantResult;
use crate::processing::{DateTag, OutputSlot};
use std::fs;
use std::path::{Path, PathBuf};

/// 一次批处理的输出目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    date: String,
}

impl OutputLayout {
    pub fn new(dest: &Path, date: &DateTag) -> Self {
        let date = date.as_str().to_string();
        Self {
            root: dest.join(format!("{date}{}", layout::OUTPUT_DIR_SUFFIX)),
            date,
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 输出位置对应的目录
    pub fn dir_for(&self, slot: OutputSlot) -> PathBuf {
        match slot {
            OutputSlot::Fluorescence => self.root.join(layout::FLUORESCENCE_DIR),
            OutputSlot::Reference => self.root.join(layout::REFERENCE_DIR),
            OutputSlot::Drawing => self.root.join(layout::DRAWINGS_DIR),
            OutputSlot::ImageTable => self
                .root
                .join(format!("{}{}", self.date, layout::CSV_DIR_SUFFIX)),
            OutputSlot::Summary => self.root.clone(),
        }
    }

    /// 输出文件的完整路径
    pub fn path_for(&self, slot: OutputSlot, name: &str, extension: &str) -> PathBuf {
        self.dir_for(slot).join(format!("{name}.{extension}"))
    }

    /// 创建全部目录（已存在时不报错）
    pub fn create_all(&self) -> QuantResult<()> {
        for slot in [
            OutputSlot::Fluorescence,
            OutputSlot::Reference,
            OutputSlot::Drawing,
            OutputSlot::ImageTable,
            OutputSlot::Summary,
        ] {
            fs::create_dir_all(self.dir_for(slot))?;
        }
        Ok(())
    }
}
