// ==========================================
// 车队运营后台 - 表格解码器
// ==========================================
// 职责: 文件字节 → 第一张工作表的 RawGrid（不做任何类型转换）
// 支持: Excel (.xlsx/.xls/.ods，calamine) / CSV (.csv)
// ==========================================

use crate::domain::{RawCell, RawGrid};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;

/// 支持的扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods", "csv"];

// ZIP（xlsx / ods）与 OLE2（xls）文件头
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ==========================================
// SheetDecoder Trait
// ==========================================
pub trait SheetDecoder: Send + Sync {
    /// 解码第一张工作表
    ///
    /// # 返回
    /// - Ok(RawGrid): 行优先的原始单元格
    /// - Err(EmptyFile): 不含任何非空单元格
    fn decode(&self, bytes: &[u8]) -> ImportResult<RawGrid>;
}

// ==========================================
// Excel 解码器
// ==========================================
pub struct ExcelDecoder;

impl SheetDecoder for ExcelDecoder {
    fn decode(&self, bytes: &[u8]) -> ImportResult<RawGrid> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // used range 不一定从 A1 开始，补齐前导空行/空列，保证行列号为工作表绝对位置
        let Some((start_row, start_col)) = range.start() else {
            return Err(ImportError::EmptyFile);
        };

        let mut grid: RawGrid = vec![Vec::new(); start_row as usize];
        for row in range.rows() {
            let mut cells = vec![RawCell::Empty; start_col as usize];
            cells.extend(row.iter().map(convert_cell));
            grid.push(cells);
        }

        ensure_not_empty(grid)
    }
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) if s.is_empty() => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => RawCell::DateSerial(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Error(e.to_string()),
    }
}

// ==========================================
// CSV 解码器
// ==========================================
pub struct CsvDecoder;

impl SheetDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8]) -> ImportResult<RawGrid> {
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 表头行由 HeaderLocator 定位
            .flexible(true) // 允许行长度不一致
            .from_reader(body);

        let mut grid = Vec::new();
        // 按字节读取，非 UTF-8 单元格（如 Latin-1 姓名）有损转换，不影响其余行
        for result in reader.byte_records() {
            let record = result?;
            grid.push(
                record
                    .iter()
                    .map(|field| RawCell::from(String::from_utf8_lossy(field).as_ref()))
                    .collect(),
            );
        }

        ensure_not_empty(grid)
    }
}

// ==========================================
// 通用解码器（按文件头自动选择）
// ==========================================
pub struct UniversalSheetDecoder;

impl UniversalSheetDecoder {
    /// 扩展名检查（无扩展名时交给文件头判断）
    pub fn check_extension(path: &Path) -> ImportResult<()> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(());
        };
        let ext = ext.to_lowercase();
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(ImportError::UnsupportedFormat(ext))
        }
    }
}

impl SheetDecoder for UniversalSheetDecoder {
    fn decode(&self, bytes: &[u8]) -> ImportResult<RawGrid> {
        if bytes.is_empty() {
            return Err(ImportError::EmptyFile);
        }
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            ExcelDecoder.decode(bytes)
        } else {
            CsvDecoder.decode(bytes)
        }
    }
}

fn ensure_not_empty(grid: RawGrid) -> ImportResult<RawGrid> {
    let has_content = grid
        .iter()
        .flatten()
        .any(|cell| !matches!(cell, RawCell::Empty));
    if has_content {
        Ok(grid)
    } else {
        Err(ImportError::EmptyFile)
    }
}
