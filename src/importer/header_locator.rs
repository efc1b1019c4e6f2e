// ==========================================
// 车队运营后台 - 表头定位器
// ==========================================
// 职责: 在任意表格的前 N 行中找出列表头行，生成 字段 → 列位置 映射
// 规则: 单元格小写 + TRIM 后按同义词做子串匹配；命中字段数最多的行胜出
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{ColumnField, ColumnIndexMap, ColumnSpec, RawCell, RawGrid};
use crate::importer::cell_normalizer::clean_cell;

/// 定位结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLocation {
    pub row_index: usize,      // 表头行在网格中的下标（0 起）
    pub matched_fields: usize, // 表头行命中的字段数
    pub columns: ColumnIndexMap,
}

pub struct HeaderLocator {
    scan_rows: usize,
    min_matches: usize,
}

impl HeaderLocator {
    pub fn new(settings: &ImportSettings) -> Self {
        Self {
            scan_rows: settings.header_scan_rows,
            min_matches: settings.min_header_matches,
        }
    }

    /// 定位表头行
    ///
    /// # 返回
    /// - Some(HeaderLocation): 命中字段数 >= 下限的最佳行
    /// - None: 未找到表头（整批硬停止）
    pub fn locate(&self, grid: &RawGrid, columns: &[ColumnSpec]) -> Option<HeaderLocation> {
        let (row_index, matched_fields) = self.best_candidate(grid, columns)?;
        if matched_fields < self.min_matches {
            return None;
        }

        let cells = normalized_row(&grid[row_index]);
        let mut map = ColumnIndexMap::default();
        for spec in columns {
            if let Some(idx) = cells.iter().position(|cell| matches_spec(cell, spec)) {
                map.insert(spec.field, idx);
            }
        }
        // 首列表头经常缺失或写错，日期列兜底为第 0 列
        if !map.contains(ColumnField::Date) {
            map.insert(ColumnField::Date, 0);
        }

        Some(HeaderLocation {
            row_index,
            matched_fields,
            columns: map,
        })
    }

    /// 扫描范围内命中字段数最多的行（不考虑下限）
    ///
    /// 并列时取最靠前的行；全部为 0 时返回 None
    pub fn best_candidate(&self, grid: &RawGrid, columns: &[ColumnSpec]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (row_index, row) in grid.iter().take(self.scan_rows).enumerate() {
            let cells = normalized_row(row);
            let count = columns
                .iter()
                .filter(|spec| cells.iter().any(|cell| matches_spec(cell, spec)))
                .count();
            let better = match best {
                Some((_, best_count)) => count > best_count,
                None => count > 0,
            };
            if better {
                best = Some((row_index, count));
            }
        }
        best
    }
}

fn normalized_row(row: &[RawCell]) -> Vec<String> {
    row.iter().map(|c| clean_cell(c).to_lowercase()).collect()
}

fn matches_spec(cell: &str, spec: &ColumnSpec) -> bool {
    !cell.is_empty()
        && spec
            .synonyms
            .iter()
            .any(|syn| cell.contains(&syn.to_lowercase()))
}
