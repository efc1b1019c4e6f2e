// ==========================================
// 车队运营后台 - 导入领域模型
// ==========================================
// 职责: 原始单元格 / 列定义表 / 规范行 / 跳过行 / 冲突 / 导入状态
// 生命周期: RawGrid 仅在抽取阶段存在；ImportState 是流水线唯一可变状态
// ==========================================

use crate::domain::daily_entry::DailyEntry;
use crate::domain::types::{ConflictKind, StatusTag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// ==========================================
// RawCell / RawGrid - 解码器输出的原始单元格
// ==========================================
// 不做任何类型转换：数字/文本/日期序列号原样保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateSerial(f64), // 表格日期序列号（1899-12-30 起算天数）
    Error(String),   // #N/A / #DIV/0! 等
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        RawCell::Text(value.into())
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

/// 第一张工作表的二维单元格数组（行优先）
pub type RawGrid = Vec<Vec<RawCell>>;

// ==========================================
// ColumnField - 逻辑字段标识
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnField {
    Date,
    Day,
    Vehicle,
    Driver,
    Shift,
    QrCode,
    Rent,
    Collection,
    Fuel,
    Due,
    Payout,
}

impl fmt::Display for ColumnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnField::Date => "date",
            ColumnField::Day => "day",
            ColumnField::Vehicle => "vehicle",
            ColumnField::Driver => "driver",
            ColumnField::Shift => "shift",
            ColumnField::QrCode => "qr_code",
            ColumnField::Rent => "rent",
            ColumnField::Collection => "collection",
            ColumnField::Fuel => "fuel",
            ColumnField::Due => "due",
            ColumnField::Payout => "payout",
        };
        write!(f, "{}", name)
    }
}

// ==========================================
// ColumnSpec - 列定义（字段 → 表头同义词）
// ==========================================
// 声明式表格，由表头定位器统一匹配，不做逐字段特判
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub field: ColumnField,
    pub label: &'static str,
    pub synonyms: &'static [&'static str],
    pub required: bool,
}

/// 日报导入列定义
pub const DAILY_ENTRY_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        field: ColumnField::Date,
        label: "Date",
        synonyms: &["Date", "Trip Date", "Run Date"],
        required: true,
    },
    ColumnSpec {
        field: ColumnField::Day,
        label: "Day",
        synonyms: &["Day", "Day Name"],
        required: false,
    },
    ColumnSpec {
        field: ColumnField::Vehicle,
        label: "Vehicle",
        synonyms: &["Vehicle", "Vehicle No", "Vehicle Number"],
        required: false,
    },
    ColumnSpec {
        field: ColumnField::Driver,
        label: "Driver",
        synonyms: &["Driver", "Driver Name"],
        required: true,
    },
    ColumnSpec {
        field: ColumnField::Shift,
        label: "Shift",
        synonyms: &["Shift", "Shift Type"],
        required: true,
    },
    ColumnSpec {
        field: ColumnField::QrCode,
        label: "QR CODE",
        synonyms: &["QR CODE", "QRCode", "QR"],
        required: true,
    },
    ColumnSpec {
        field: ColumnField::Rent,
        label: "Rent",
        synonyms: &["Rent", "Rental"],
        required: true,
    },
    ColumnSpec {
        field: ColumnField::Collection,
        label: "Collection",
        synonyms: &["Collection", "Amount Collected", "Collected"],
        required: false,
    },
    ColumnSpec {
        field: ColumnField::Fuel,
        label: "Fuel",
        synonyms: &["Fuel", "Fuel Expense", "Fuel Cost", "Encho Fuel"],
        required: false,
    },
    ColumnSpec {
        field: ColumnField::Due,
        label: "Due",
        synonyms: &["Due", "Balance", "Pending", "Due Amount"],
        required: false,
    },
    ColumnSpec {
        field: ColumnField::Payout,
        label: "Payout",
        synonyms: &["Payout", "Pay Out", "Paid", "Payout Amount", "Pay to Driver"],
        required: false,
    },
];

// ==========================================
// ColumnIndexMap - 字段 → 表头行中的列位置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIndexMap {
    indices: HashMap<ColumnField, usize>,
}

impl ColumnIndexMap {
    pub fn insert(&mut self, field: ColumnField, index: usize) {
        self.indices.insert(field, index);
    }

    /// None 表示表头中未找到该字段
    pub fn get(&self, field: ColumnField) -> Option<usize> {
        self.indices.get(&field).copied()
    }

    pub fn contains(&self, field: ColumnField) -> bool {
        self.indices.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// ==========================================
// RowFields - 按列映射后的文本字段
// ==========================================
// 所有值均已 TRIM；数值字段在晋升为 ValidEntry 时才转换
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFields {
    pub date: String,
    pub day: String,
    pub vehicle: String,
    pub driver: String,
    pub shift: String,
    pub qr_code: String,
    pub rent: String,
    pub collection: String,
    pub fuel: String,
    pub due: String,
    pub payout: String,
}

impl RowFields {
    pub fn get(&self, field: ColumnField) -> &str {
        match field {
            ColumnField::Date => &self.date,
            ColumnField::Day => &self.day,
            ColumnField::Vehicle => &self.vehicle,
            ColumnField::Driver => &self.driver,
            ColumnField::Shift => &self.shift,
            ColumnField::QrCode => &self.qr_code,
            ColumnField::Rent => &self.rent,
            ColumnField::Collection => &self.collection,
            ColumnField::Fuel => &self.fuel,
            ColumnField::Due => &self.due,
            ColumnField::Payout => &self.payout,
        }
    }

    pub fn set(&mut self, field: ColumnField, value: String) {
        let slot = match field {
            ColumnField::Date => &mut self.date,
            ColumnField::Day => &mut self.day,
            ColumnField::Vehicle => &mut self.vehicle,
            ColumnField::Driver => &mut self.driver,
            ColumnField::Shift => &mut self.shift,
            ColumnField::QrCode => &mut self.qr_code,
            ColumnField::Rent => &mut self.rent,
            ColumnField::Collection => &mut self.collection,
            ColumnField::Fuel => &mut self.fuel,
            ColumnField::Due => &mut self.due,
            ColumnField::Payout => &mut self.payout,
        };
        *slot = value;
    }
}

// ==========================================
// CanonicalRow - 规范行（已映射、日期已解析，未校验）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRow {
    pub line_number: usize, // 原始表格行号（1 起）
    pub date: NaiveDate,    // 解析后的日期；fields.date 同步为 ISO 文本
    pub fields: RowFields,
}

impl CanonicalRow {
    pub fn driver(&self) -> &str {
        &self.fields.driver
    }
}

// ==========================================
// ValidEntry - 通过全部校验的行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidEntry {
    pub row: CanonicalRow,
    pub entry: DailyEntry, // 最终落库的记录（新 UUID）
}

// ==========================================
// SkippedRow - 被拒绝的行（仅供人工复核，不落库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub line_number: usize,
    pub fields: RowFields,
    pub reason: String,
}

impl SkippedRow {
    pub fn new(line_number: usize, fields: RowFields, reason: impl Into<String>) -> Self {
        Self {
            line_number,
            fields,
            reason: reason.into(),
        }
    }

    pub fn from_row(row: &CanonicalRow, reason: impl Into<String>) -> Self {
        Self::new(row.line_number, row.fields.clone(), reason)
    }
}

// ==========================================
// Conflict - 流水线挂起原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConflictDetail {
    /// 必填字段缺失（字段标签列表）
    IncompleteRow { missing_fields: Vec<String> },
    /// 司机不存在或已离职（原样保留表格中的姓名）
    MissingDriver { driver_name: String },
    /// 重复流水；is_batch_duplicate 区分本批次已接收 / 已落库
    DuplicateEntry {
        existing: DailyEntry,
        incoming: DailyEntry,
        is_batch_duplicate: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub position: usize, // 队列位置（即挂起时的游标）
    pub row: CanonicalRow,
    pub detail: ConflictDetail,
}

impl Conflict {
    pub fn kind(&self) -> ConflictKind {
        match self.detail {
            ConflictDetail::IncompleteRow { .. } => ConflictKind::IncompleteRow,
            ConflictDetail::MissingDriver { .. } => ConflictKind::MissingDriver,
            ConflictDetail::DuplicateEntry { .. } => ConflictKind::DuplicateEntry,
        }
    }
}

// ==========================================
// 落库结果
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub deleted: usize,  // 覆盖删除的已存在流水数
    pub inserted: usize, // 批量插入的新流水数
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Completion {
    Pending,                   // 队列已耗尽，尚未落库
    Committed(FinalizeReport), // 落库成功
    Failed { message: String }, // 落库失败（内存状态保留以便复核）
}

// ==========================================
// ImportStatus - 状态机
// ==========================================
// idle → running → (suspended ⇄ running)* → done
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportStatus {
    Idle,
    Running,
    Suspended { conflict: Conflict },
    Done { completion: Completion },
}

impl ImportStatus {
    pub fn tag(&self) -> StatusTag {
        match self {
            ImportStatus::Idle => StatusTag::Idle,
            ImportStatus::Running => StatusTag::Running,
            ImportStatus::Suspended { .. } => StatusTag::Suspended,
            ImportStatus::Done { .. } => StatusTag::Done,
        }
    }
}

/// 逐行校验的阶段；覆盖/登记后从指定阶段重新校验
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValidationStage {
    #[default]
    Completeness,
    EntityExistence,
    Duplicate,
}

// ==========================================
// ImportState - 流水线唯一可变状态
// ==========================================
// 不变量:
// - 游标只前进（或挂起），仅在放弃整批时归零
// - 已处理行恰好落在 valid_entries / skipped_rows 之一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportState {
    pub queue: Vec<CanonicalRow>,
    pub cursor: usize,
    pub valid_entries: Vec<ValidEntry>,
    pub skipped_rows: Vec<SkippedRow>,
    pub overridden_ids: BTreeSet<String>,
    pub status: ImportStatus,
    pub recheck_from: ValidationStage,
}

impl Default for ImportState {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            cursor: 0,
            valid_entries: Vec::new(),
            skipped_rows: Vec::new(),
            overridden_ids: BTreeSet::new(),
            status: ImportStatus::Idle,
            recheck_from: ValidationStage::Completeness,
        }
    }
}

impl ImportState {
    pub fn tag(&self) -> StatusTag {
        self.status.tag()
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        match &self.status {
            ImportStatus::Suspended { conflict } => Some(conflict),
            _ => None,
        }
    }

    pub fn current_row(&self) -> Option<&CanonicalRow> {
        self.queue.get(self.cursor)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }

    /// 按原始行号定位已接收的行（用于检查互斥不变量）
    pub fn is_accepted(&self, line_number: usize) -> bool {
        self.valid_entries
            .iter()
            .any(|v| v.row.line_number == line_number)
    }

    pub fn is_skipped(&self, line_number: usize) -> bool {
        self.skipped_rows
            .iter()
            .any(|s| s.line_number == line_number)
    }
}
