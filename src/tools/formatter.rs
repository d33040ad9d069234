//! 输出格式化模块
//!
//! 测量表的CSV格式（ImageJ结果表风格：首列为从1开始的行号，列名为一个空格），
//! 以及控制台上的汇总表与批处理完成信息。

use super::constants::table_format;
use super::layout::OutputLayout;
use crate::processing::{BatchOutcome, BatchSummaryTable, Cell, ResultTable};
use comfy_table::{CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use std::io;
use std::path::Path;

/// 格式化单个数值单元格
#[inline]
pub fn format_number(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.prec$}", prec = table_format::DECIMAL_PLACES)
    } else {
        table_format::NAN_TEXT.to_string()
    }
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Number(v) => format_number(*v),
        Cell::Count(n) => n.to_string(),
        Cell::Text(s) => s.clone(),
    }
}

/// 把结果表写为CSV文件
pub fn write_csv(table: &ResultTable, path: &Path) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    write_records(table, &mut writer)
}

fn write_records<W: io::Write>(
    table: &ResultTable,
    writer: &mut csv::Writer<W>,
) -> csv::Result<()> {
    let header = std::iter::once(table_format::INDEX_HEADER.to_string())
        .chain(table.columns().iter().cloned());
    writer.write_record(header)?;

    for (index, row) in table.rows().iter().enumerate() {
        let record = std::iter::once((index + 1).to_string()).chain(row.iter().map(format_cell));
        writer.write_record(record)?;
    }

    writer.flush()?;
    Ok(())
}

/// 控制台汇总表
pub fn render_summary_table(summary: &BatchSummaryTable) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "File / 文件",
        "Particles / 颗粒数",
        "Mean area (µm²)",
        "Mean int.",
        "Sum IntDen",
        "Round",
        "Circ.",
    ]);

    for row in summary.rows() {
        table.add_row(vec![
            comfy_table::Cell::new(&row.file_name),
            comfy_table::Cell::new(row.particle_nums).set_alignment(CellAlignment::Right),
            comfy_table::Cell::new(format_number(row.mean_areas))
                .set_alignment(CellAlignment::Right),
            comfy_table::Cell::new(format_number(row.mean_meanints))
                .set_alignment(CellAlignment::Right),
            comfy_table::Cell::new(format_number(row.sum_intdens))
                .set_alignment(CellAlignment::Right),
            comfy_table::Cell::new(format_number(row.mean_roundness))
                .set_alignment(CellAlignment::Right),
            comfy_table::Cell::new(format_number(row.mean_circ))
                .set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

/// 显示批量处理完成信息
pub fn show_batch_completion_info(outcome: &BatchOutcome, layout: &OutputLayout, verbose: bool) {
    let stats = &outcome.stats;

    println!();
    if !outcome.table.is_empty() {
        println!("{}", render_summary_table(&outcome.table));
    }

    println!("[INFO] 批量处理完成 / Batch finished");
    println!(
        "   成功处理 / Processed: {} / {} 个文件 / files",
        stats.processed, outcome.total_files
    );
    if stats.failed > 0 {
        println!(
            "   失败文件 / Failed: {} ({:.1}% 成功率 / success rate)",
            stats.failed,
            stats.success_rate()
        );
        for (category, files) in &stats.error_stats {
            println!("   [FAIL] {}: {}", category.display_name(), files.join(", "));
        }
    }
    if outcome.cancelled {
        println!("[WARNING] 批处理被取消，汇总表只包含已完成的文件 / Batch cancelled, summary holds completed files only");
    }

    println!();
    println!("[OK] 输出目录 / Output: {}", layout.root().display());
    if verbose {
        println!("   每个图像都保存了荧光图、参考图、掩膜和测量表 / Each image has fluorescence, reference, mask and table outputs");
    }
}
