//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 定量算法常量
pub mod analysis {
    /// 阈值公式中的标准差倍数：T = mean + 3·sd
    ///
    /// 归一化后背景近似高斯，凝聚体是稀疏的亮离群点
    pub const SIGMA_FACTOR: f64 = 3.0;
}

/// 默认配置值
pub mod defaults {
    /// 滚球半径（像素）
    pub const ROLLING_RADIUS: f64 = 20.0;

    /// 颗粒面积下界（µm²），低于此值视为噪声像素
    pub const MIN_PARTICLE_AREA: f64 = 0.04;

    /// 颗粒面积上界（µm²），高于此值视为粘连团块
    pub const MAX_PARTICLE_AREA: f64 = 500.0;

    /// 文件不含标定时的像素尺寸（µm/px）
    ///
    /// 100x物镜 + 6.5µm像元相机
    pub const PIXEL_SIZE_MICRONS: f64 = 0.065;

    /// 默认扫描的文件扩展名
    pub const EXTENSIONS: &[&str] = &["tif", "tiff"];

    /// 默认多文件并行并发度
    ///
    /// 4并发度在多数场景下提供良好的性能/资源平衡
    pub const PARALLEL_FILES_DEGREE: usize = 4;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 限制最大并发度为16，避免过度并发导致内存占用过高
    /// （每个工作线程同时持有原图、背景、掩膜）
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}

/// 输出目录结构
pub mod layout {
    /// 输出根目录后缀：`<date>_output`
    pub const OUTPUT_DIR_SUFFIX: &str = "_output";

    /// 表格目录后缀：`<date>_csv`
    pub const CSV_DIR_SUFFIX: &str = "_csv";

    /// 汇总表文件名后缀：`<date>_particle_stat`
    pub const SUMMARY_SUFFIX: &str = "_particle_stat";

    pub const FLUORESCENCE_DIR: &str = "Green";
    pub const REFERENCE_DIR: &str = "BF";
    pub const DRAWINGS_DIR: &str = "Drawings";
}

/// CSV输出格式
pub mod table_format {
    /// 行号列的列名（ImageJ结果表风格）
    pub const INDEX_HEADER: &str = " ";

    /// 小数位数
    pub const DECIMAL_PLACES: usize = 3;

    /// 非数值单元格
    pub const NAN_TEXT: &str = "NaN";
}
