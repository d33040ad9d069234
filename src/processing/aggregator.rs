//! 单图像聚合
//!
//! 把颗粒序列（可能为空）归约为：
//! - 每颗粒一行的测量表（零颗粒时恰好一行NaN哨兵行），附带溯源列
//! - 每个颗粒属性的累加统计，供批处理汇总行使用
//!
//! 零颗粒是正常结果，不是错误。

use super::table::{Cell, ResultTable};
use crate::core::{GlobalStats, Particle, Threshold};
use serde::Serialize;

/// 单图像测量表列名
pub const PER_IMAGE_COLUMNS: [&str; 22] = [
    "Area",
    "Mean",
    "Min",
    "Max",
    "X",
    "Y",
    "Circ.",
    "IntDen",
    "RawIntDen",
    "AR",
    "Round",
    "Solidity",
    "Date",
    "Raw_gMean",
    "Raw_gMedian",
    "Raw_gMode",
    "Raw_gSD",
    "gMean",
    "gMedian",
    "gMode",
    "gSD",
    "Threshold",
];

/// 批处理汇总表列名
pub const SUMMARY_COLUMNS: [&str; 11] = [
    "Date",
    "File_name",
    "particle_nums",
    "mean_areas",
    "mean_meanints",
    "mean_intdens",
    "sum_intdens",
    "mean_roundness",
    "mean_AR",
    "mean_circ",
    "mean_solidity",
];

/// 实验日期标签
///
/// 表格中的日期前加一个空格，防止电子表格软件把它自动转换成日期；
/// 目录名使用原始标签。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTag(String);

impl DateTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().to_string())
    }

    /// 原始标签（用于目录和文件名）
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 表格单元格文本
    #[inline]
    pub fn cell_text(&self) -> String {
        format!(" {}", self.0)
    }
}

/// 参与聚合的颗粒属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleAttribute {
    Area,
    MeanIntensity,
    IntegratedDensity,
    Roundness,
    AspectRatio,
    Circularity,
    Solidity,
}

impl ParticleAttribute {
    pub const ALL: [ParticleAttribute; 7] = [
        ParticleAttribute::Area,
        ParticleAttribute::MeanIntensity,
        ParticleAttribute::IntegratedDensity,
        ParticleAttribute::Roundness,
        ParticleAttribute::AspectRatio,
        ParticleAttribute::Circularity,
        ParticleAttribute::Solidity,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    /// 从颗粒取该属性的值
    pub fn value_of(self, particle: &Particle) -> f64 {
        match self {
            ParticleAttribute::Area => particle.area,
            ParticleAttribute::MeanIntensity => particle.mean_intensity,
            ParticleAttribute::IntegratedDensity => particle.integrated_density,
            ParticleAttribute::Roundness => particle.roundness,
            ParticleAttribute::AspectRatio => particle.aspect_ratio,
            ParticleAttribute::Circularity => particle.circularity,
            ParticleAttribute::Solidity => particle.solidity,
        }
    }
}

/// 单属性的累加统计（Welford）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// 算术平均；无数据时为NaN
    #[inline]
    pub fn mean(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.mean }
    }

    /// 样本方差；少于两个数据时为NaN
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            f64::NAN
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }
}

/// 每个颗粒属性一个累加器
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeAccumulators {
    stats: [RunningStats; 7],
}

impl AttributeAccumulators {
    pub fn from_particles(particles: &[Particle]) -> Self {
        let mut acc = Self::default();
        for particle in particles {
            for attribute in ParticleAttribute::ALL {
                acc.stats[attribute.index()].push(attribute.value_of(particle));
            }
        }
        acc
    }

    #[inline]
    pub fn get(&self, attribute: ParticleAttribute) -> &RunningStats {
        &self.stats[attribute.index()]
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.stats[ParticleAttribute::Area.index()].count()
    }

    #[inline]
    pub fn mean(&self, attribute: ParticleAttribute) -> f64 {
        self.get(attribute).mean()
    }
}

/// 测量表的颗粒部分（溯源列由报告统一附加）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRow {
    pub area: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub x: f64,
    pub y: f64,
    pub circularity: f64,
    pub int_den: f64,
    pub raw_int_den: f64,
    pub aspect_ratio: f64,
    pub roundness: f64,
    pub solidity: f64,
}

impl MeasurementRow {
    /// 零颗粒哨兵行：全部颗粒字段为NaN
    pub fn sentinel() -> Self {
        Self {
            area: f64::NAN,
            mean: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            x: f64::NAN,
            y: f64::NAN,
            circularity: f64::NAN,
            int_den: f64::NAN,
            raw_int_den: f64::NAN,
            aspect_ratio: f64::NAN,
            roundness: f64::NAN,
            solidity: f64::NAN,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.area.is_nan()
    }

    fn cells(&self) -> [f64; 12] {
        [
            self.area,
            self.mean,
            self.min,
            self.max,
            self.x,
            self.y,
            self.circularity,
            self.int_den,
            self.raw_int_den,
            self.aspect_ratio,
            self.roundness,
            self.solidity,
        ]
    }
}

impl From<&Particle> for MeasurementRow {
    fn from(p: &Particle) -> Self {
        Self {
            area: p.area,
            mean: p.mean_intensity,
            min: p.min_intensity,
            max: p.max_intensity,
            x: p.centroid_x,
            y: p.centroid_y,
            circularity: p.circularity,
            int_den: p.calibrated_integrated_density(),
            raw_int_den: p.integrated_density,
            aspect_ratio: p.aspect_ratio,
            roundness: p.roundness,
            solidity: p.solidity,
        }
    }
}

/// 单图像报告
#[derive(Debug, Clone)]
pub struct PerImageReport {
    pub file_id: String,
    pub date: DateTag,
    pub raw_stats: GlobalStats,
    pub normalized_stats: GlobalStats,
    pub threshold: Threshold,
    rows: Vec<MeasurementRow>,
    accumulators: AttributeAccumulators,
}

impl PerImageReport {
    /// 聚合颗粒序列
    pub fn aggregate(
        particles: &[Particle],
        raw_stats: GlobalStats,
        normalized_stats: GlobalStats,
        threshold: Threshold,
        date: DateTag,
        file_id: impl Into<String>,
    ) -> Self {
        let rows = if particles.is_empty() {
            vec![MeasurementRow::sentinel()]
        } else {
            particles.iter().map(MeasurementRow::from).collect()
        };

        Self {
            file_id: file_id.into(),
            date,
            raw_stats,
            normalized_stats,
            threshold,
            rows,
            accumulators: AttributeAccumulators::from_particles(particles),
        }
    }

    /// 测量表行（零颗粒时为单个哨兵行）
    #[inline]
    pub fn rows(&self) -> &[MeasurementRow] {
        &self.rows
    }

    /// 实际测量的颗粒数（哨兵行不计）
    #[inline]
    pub fn particle_count(&self) -> usize {
        self.accumulators.particle_count()
    }

    #[inline]
    pub fn accumulators(&self) -> &AttributeAccumulators {
        &self.accumulators
    }

    /// 转为带溯源列的测量表
    pub fn to_table(&self) -> ResultTable {
        let mut table = ResultTable::new(&PER_IMAGE_COLUMNS);
        let date = self.date.cell_text();
        let provenance = [
            self.raw_stats.mean,
            self.raw_stats.median,
            self.raw_stats.mode,
            self.raw_stats.std_dev,
            self.normalized_stats.mean,
            self.normalized_stats.median,
            self.normalized_stats.mode,
            self.normalized_stats.std_dev,
            self.threshold.value,
        ];

        for row in &self.rows {
            let mut cells: Vec<Cell> = row.cells().into_iter().map(Cell::Number).collect();
            cells.push(Cell::Text(date.clone()));
            cells.extend(provenance.iter().map(|&v| Cell::Number(v)));
            table.push_row(cells);
        }
        table
    }

    /// 折叠为批处理汇总行
    ///
    /// 总积分密度按 颗粒数 × 平均积分密度 计算，而不是独立求和。
    pub fn summary_row(&self) -> BatchSummaryRow {
        let acc = &self.accumulators;
        let count = acc.particle_count();
        let mean_intdens = acc.mean(ParticleAttribute::IntegratedDensity);

        BatchSummaryRow {
            date: self.date.cell_text(),
            file_name: self.file_id.clone(),
            particle_nums: count,
            mean_areas: acc.mean(ParticleAttribute::Area),
            mean_meanints: acc.mean(ParticleAttribute::MeanIntensity),
            mean_intdens,
            sum_intdens: count as f64 * mean_intdens,
            mean_roundness: acc.mean(ParticleAttribute::Roundness),
            mean_ar: acc.mean(ParticleAttribute::AspectRatio),
            mean_circ: acc.mean(ParticleAttribute::Circularity),
            mean_solidity: acc.mean(ParticleAttribute::Solidity),
        }
    }
}

/// 批处理汇总表的一行（每个成功处理的图像一行）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummaryRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "File_name")]
    pub file_name: String,
    pub particle_nums: usize,
    pub mean_areas: f64,
    pub mean_meanints: f64,
    pub mean_intdens: f64,
    pub sum_intdens: f64,
    pub mean_roundness: f64,
    #[serde(rename = "mean_AR")]
    pub mean_ar: f64,
    pub mean_circ: f64,
    pub mean_solidity: f64,
}

impl BatchSummaryRow {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.date.clone()),
            Cell::Text(self.file_name.clone()),
            Cell::Count(self.particle_nums),
            Cell::Number(self.mean_areas),
            Cell::Number(self.mean_meanints),
            Cell::Number(self.mean_intdens),
            Cell::Number(self.sum_intdens),
            Cell::Number(self.mean_roundness),
            Cell::Number(self.mean_ar),
            Cell::Number(self.mean_circ),
            Cell::Number(self.mean_solidity),
        ]
    }
}

/// 批处理汇总表（按文件处理顺序）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchSummaryTable {
    rows: Vec<BatchSummaryRow>,
}

impl BatchSummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: BatchSummaryRow) {
        self.rows.push(row);
    }

    #[inline]
    pub fn rows(&self) -> &[BatchSummaryRow] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_table(&self) -> ResultTable {
        let mut table = ResultTable::new(&SUMMARY_COLUMNS);
        for row in &self.rows {
            table.push_row(row.cells());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(mean: f64, sd: f64) -> GlobalStats {
        GlobalStats {
            mean,
            median: mean,
            mode: mean,
            std_dev: sd,
        }
    }

    fn threshold(value: f64) -> Threshold {
        Threshold {
            value,
            upper: 65535.0,
            degenerate: false,
        }
    }

    fn particle(area: f64, mean: f64, pixels: usize) -> Particle {
        Particle {
            pixel_count: pixels,
            area,
            mean_intensity: mean,
            min_intensity: mean,
            max_intensity: mean,
            integrated_density: pixels as f64 * mean,
            centroid_x: 1.0,
            centroid_y: 2.0,
            perimeter: 1.0,
            circularity: 0.9,
            aspect_ratio: 1.2,
            roundness: 0.8,
            solidity: 0.95,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut s = RunningStats::default();
        assert!(s.mean().is_nan());
        for v in [2.0, 4.0, 6.0] {
            s.push(v);
        }
        assert_eq!(s.count(), 3);
        assert!((s.mean() - 4.0).abs() < 1e-12);
        assert!((s.variance() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_particles_yield_single_sentinel_row() {
        let report = PerImageReport::aggregate(
            &[],
            stats(10.0, 2.0),
            stats(0.0, 0.0),
            threshold(0.0),
            DateTag::new("2022-02-05"),
            "empty",
        );
        assert_eq!(report.rows().len(), 1);
        assert!(report.rows()[0].is_sentinel());
        assert_eq!(report.particle_count(), 0);

        let table = report.to_table();
        assert_eq!(table.len(), 1);
        assert!(matches!(table.cell(0, "Area"), Some(Cell::Number(v)) if v.is_nan()));
        assert_eq!(table.cell(0, "Date"), Some(&Cell::Text(" 2022-02-05".into())));
        assert_eq!(table.cell(0, "Raw_gMean"), Some(&Cell::Number(10.0)));

        let row = report.summary_row();
        assert_eq!(row.particle_nums, 0);
        assert!(row.mean_areas.is_nan());
        assert!(row.sum_intdens.is_nan());
    }

    #[test]
    fn test_provenance_repeated_on_every_row() {
        let particles = [particle(0.25, 1000.0, 25), particle(0.5, 500.0, 50)];
        let report = PerImageReport::aggregate(
            &particles,
            stats(12.0, 3.0),
            stats(4.0, 1.5),
            threshold(8.5),
            DateTag::new("2023-05-19"),
            "img",
        );
        let table = report.to_table();
        assert_eq!(table.len(), 2);
        for r in 0..2 {
            assert_eq!(table.cell(r, "Threshold"), Some(&Cell::Number(8.5)));
            assert_eq!(table.cell(r, "gSD"), Some(&Cell::Number(1.5)));
        }
        assert_eq!(table.cell(1, "RawIntDen"), Some(&Cell::Number(25000.0)));
    }

    #[test]
    fn test_summary_row_identity() {
        let particles = [
            particle(0.25, 1000.0, 25),
            particle(0.5, 500.0, 50),
            particle(0.1, 333.3, 10),
        ];
        let report = PerImageReport::aggregate(
            &particles,
            stats(1.0, 1.0),
            stats(1.0, 1.0),
            threshold(4.0),
            DateTag::new("d"),
            "f",
        );
        let row = report.summary_row();
        assert_eq!(row.particle_nums, 3);
        assert_eq!(row.sum_intdens, 3.0 * row.mean_intdens);
        let direct_sum: f64 = particles.iter().map(|p| p.integrated_density).sum();
        assert!((row.sum_intdens - direct_sum).abs() < 1e-6);
        assert!((row.mean_areas - (0.85 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_summary_json_uses_column_names() {
        let mut table = BatchSummaryTable::new();
        table.push(BatchSummaryRow {
            date: " d".into(),
            file_name: "f".into(),
            particle_nums: 1,
            mean_areas: 0.25,
            mean_meanints: 1000.0,
            mean_intdens: 25000.0,
            sum_intdens: 25000.0,
            mean_roundness: 1.0,
            mean_ar: 1.0,
            mean_circ: 1.0,
            mean_solidity: 1.0,
        });
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[0]["File_name"], "f");
        assert_eq!(json[0]["mean_AR"], 1.0);
    }
}
