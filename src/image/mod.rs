//! 图像数据层
//!
//! 二维强度图像、掩膜、双通道图像对，以及TIFF读写。

pub mod channel_pair;
pub mod format;
pub mod tiff_loader;
pub mod tiff_writer;

pub use channel_pair::{ChannelPair, ChannelPairLoader, file_id};
pub use format::{BitDepth, Image2D, Mask};
pub use tiff_loader::TiffChannelLoader;
pub use tiff_writer::write_tiff;
