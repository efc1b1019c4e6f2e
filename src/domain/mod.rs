// ==========================================
// 车队运营后台 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod daily_entry;
pub mod driver;
pub mod import;
pub mod types;

// 重导出核心类型
pub use daily_entry::DailyEntry;
pub use driver::{Driver, NewDriver};
pub use import::{
    CanonicalRow, ColumnField, ColumnIndexMap, ColumnSpec, Completion, Conflict, ConflictDetail,
    FinalizeReport, ImportState, ImportStatus, RawCell, RawGrid, RowFields, SkippedRow,
    ValidEntry, ValidationStage, DAILY_ENTRY_COLUMNS,
};
pub use types::{ConflictKind, DriverStatus, StatusTag};
