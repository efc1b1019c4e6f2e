// ==========================================
// 车队运营后台 - 导入层
// ==========================================
// 职责: 第三方日报表格导入与对账
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod cell_normalizer;
pub mod conflict_resolver;
pub mod error;
pub mod file_parser;
pub mod finalizer;
pub mod header_locator;
pub mod import_session;
pub mod pipeline;
pub mod row_extractor;
pub mod skipped_report;
pub mod snapshot;

// 重导出核心类型
pub use cell_normalizer::{
    clean_cell, parse_date_text, parse_flexible_date, parse_flexible_number, to_serial,
    weekday_name,
};
pub use conflict_resolver::{ConflictResolver, Resolution};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvDecoder, ExcelDecoder, SheetDecoder, UniversalSheetDecoder};
pub use finalizer::Finalizer;
pub use header_locator::{HeaderLocation, HeaderLocator};
pub use import_session::{ImportProgress, ImportSession, RunOutcome};
pub use pipeline::{PipelineEvent, StepOutcome, ValidationPipeline};
pub use row_extractor::{ExtractedRows, ExtractionStop, RowExtractor};
pub use skipped_report::write_skipped_rows;
pub use snapshot::ValidationSnapshot;
