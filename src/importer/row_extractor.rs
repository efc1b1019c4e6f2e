// ==========================================
// 车队运营后台 - 数据行抽取器
// ==========================================
// 职责: 从表头下一行开始逐行映射为 CanonicalRow
// 结束条件: 首列出现分节标记 / 连续垃圾行超过上限
// 日期无法解析的行直接进入 SkippedRow，不进入校验流水线
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{
    CanonicalRow, ColumnField, ColumnSpec, RawCell, RawGrid, RowFields, SkippedRow,
};
use crate::importer::cell_normalizer::{clean_cell, parse_flexible_date};
use crate::importer::header_locator::HeaderLocation;
use tracing::debug;

/// 日期无效行的跳过原因
pub const REASON_INVALID_DATE: &str = "Invalid or missing date";

const WEEKDAY_WORDS: &[&str] = &[
    "mon", "tue", "wed", "thu", "fri", "sat", "sun", "monday", "tuesday", "wednesday",
    "thursday", "friday", "saturday", "sunday",
];

/// 抽取停止原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStop {
    EndOfGrid,
    SectionMarker { line_number: usize },
    GarbageStreak { line_number: usize },
}

/// 抽取结果
#[derive(Debug, Clone)]
pub struct ExtractedRows {
    pub queue: Vec<CanonicalRow>,
    pub skipped: Vec<SkippedRow>,
    pub stop: ExtractionStop,
}

pub struct RowExtractor {
    max_garbage_streak: usize,
    section_markers: Vec<String>,
}

impl RowExtractor {
    pub fn new(settings: &ImportSettings) -> Self {
        Self {
            max_garbage_streak: settings.max_garbage_streak,
            section_markers: settings
                .section_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    /// 从表头下一行开始抽取
    ///
    /// # 参数
    /// - grid: 原始网格
    /// - location: 表头定位结果
    /// - columns: 列定义表
    pub fn extract(
        &self,
        grid: &RawGrid,
        location: &HeaderLocation,
        columns: &[ColumnSpec],
    ) -> ExtractedRows {
        let mut queue = Vec::new();
        let mut skipped = Vec::new();
        let mut garbage_streak = 0;
        let mut stop = ExtractionStop::EndOfGrid;

        for (index, row) in grid.iter().enumerate().skip(location.row_index + 1) {
            let line_number = index + 1;

            if self.is_section_boundary(row) {
                stop = ExtractionStop::SectionMarker { line_number };
                break;
            }

            if is_garbage_row(row) {
                garbage_streak += 1;
                if garbage_streak > self.max_garbage_streak {
                    stop = ExtractionStop::GarbageStreak { line_number };
                    break;
                }
                continue;
            }
            garbage_streak = 0;

            let mut fields = RowFields::default();
            for spec in columns {
                let value = location
                    .columns
                    .get(spec.field)
                    .and_then(|idx| row.get(idx))
                    .map(clean_cell)
                    .unwrap_or_default();
                fields.set(spec.field, value);
            }

            let date_cell = location
                .columns
                .get(ColumnField::Date)
                .and_then(|idx| row.get(idx))
                .unwrap_or(&RawCell::Empty);

            match parse_flexible_date(date_cell) {
                Some(date) => {
                    fields.date = date.format("%Y-%m-%d").to_string();
                    queue.push(CanonicalRow {
                        line_number,
                        date,
                        fields,
                    });
                }
                None => {
                    debug!(line = line_number, raw = %fields.date, "日期无法解析，跳过");
                    skipped.push(SkippedRow::new(line_number, fields, REASON_INVALID_DATE));
                }
            }
        }

        ExtractedRows {
            queue,
            skipped,
            stop,
        }
    }

    fn is_section_boundary(&self, row: &[RawCell]) -> bool {
        let first = row.first().map(clean_cell).unwrap_or_default().to_lowercase();
        !first.is_empty() && self.section_markers.iter().any(|m| first.contains(m.as_str()))
    }
}

/// 垃圾行: 全空，或仅有一个非空单元格且内容为星期名
fn is_garbage_row(row: &[RawCell]) -> bool {
    let non_blank: Vec<String> = row
        .iter()
        .map(clean_cell)
        .filter(|c| !c.is_empty())
        .collect();

    match non_blank.as_slice() {
        [] => true,
        [only] => WEEKDAY_WORDS.contains(&only.to_lowercase().as_str()),
        _ => false,
    }
}
