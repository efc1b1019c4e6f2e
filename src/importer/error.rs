// ==========================================
// 车队运营后台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级问题（日期无效 / 缺字段 / 重复）不是错误，
//       进入 SkippedRow 或 Conflict；这里只有整批硬停止与操作错误
// ==========================================

use crate::domain::{ConflictKind, SkippedRow, StatusTag};
use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件为空或不含任何单元格")]
    EmptyFile,

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 结构性硬停止 =====
    #[error("未找到表头行: 最佳命中 {best_matches} 个字段，至少需要 {required} 个")]
    HeaderNotFound { best_matches: usize, required: usize },

    #[error("未找到有效数据行（{} 行被跳过）", skipped.len())]
    NoValidRows { skipped: Vec<SkippedRow> },

    // ===== 状态机错误 =====
    #[error("非法状态转换: 当前状态 {from}，事件 {event}")]
    InvalidTransition { from: StatusTag, event: String },

    #[error("冲突类型 {kind} 不支持操作 {action}")]
    ResolutionNotAllowed { kind: ConflictKind, action: String },

    // ===== 冲突处理错误 =====
    #[error("登记司机需要填写姓名")]
    DriverNameRequired,

    #[error("司机已存在: {0}")]
    DriverAlreadyExists(String),

    // ===== 落库错误 =====
    #[error("落库失败: {0}")]
    FinalizeFailed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
