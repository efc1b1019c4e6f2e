// ==========================================
// 车队运营后台 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把导入/仓储错误转换为面向操作员的描述
// 约束: 所有错误信息必须包含显式原因
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} event={event}")]
    InvalidStateTransition { from: String, event: String },

    // ==========================================
    // 导入错误
    // ==========================================
    /// 整批硬停止（表头未找到 / 空文件 / 无有效行 / 格式不支持）
    #[error("文件导入失败: {0}")]
    ImportError(String),

    /// 冲突处理被拒绝，流水线保持挂起
    #[error("冲突处理失败: {0}")]
    ConflictResolutionError(String),

    /// 落库失败，内存状态保留，可人工重试
    #[error("落库失败: {0}")]
    FinalizeError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::InvalidTransition { from, event } => ApiError::InvalidStateTransition {
                from: from.to_string(),
                event,
            },
            e @ (ImportError::ResolutionNotAllowed { .. }
            | ImportError::DriverNameRequired
            | ImportError::DriverAlreadyExists(_)) => {
                ApiError::ConflictResolutionError(e.to_string())
            }
            ImportError::FinalizeFailed(msg) => ApiError::FinalizeError(msg),
            ImportError::Repository(e) => e.into(),
            ImportError::Other(e) => ApiError::Other(e),
            e => ApiError::ImportError(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
