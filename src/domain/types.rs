// ==========================================
// 车队运营后台 - 领域类型定义
// ==========================================
// 职责: 司机状态 / 冲突类型 / 导入状态标签
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 司机状态 (Driver Status)
// ==========================================
// 序列化格式与数据库一致: Active / Terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverStatus {
    Active,     // 在职
    Terminated, // 已离职
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverStatus::Active => write!(f, "Active"),
            DriverStatus::Terminated => write!(f, "Terminated"),
        }
    }
}

impl DriverStatus {
    /// 从数据库字符串解析（未知值按离职处理，避免误判为在职）
    pub fn from_db_str(raw: &str) -> Self {
        match raw.trim() {
            "Active" | "ACTIVE" | "active" => DriverStatus::Active,
            _ => DriverStatus::Terminated,
        }
    }
}

// ==========================================
// 冲突类型 (Conflict Kind)
// ==========================================
// 逐行校验失败时挂起流水线的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    IncompleteRow,  // 必填字段缺失
    MissingDriver,  // 司机不存在或已离职
    DuplicateEntry, // 同日期同司机重复
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::IncompleteRow => write!(f, "incomplete-row"),
            ConflictKind::MissingDriver => write!(f, "missing-driver"),
            ConflictKind::DuplicateEntry => write!(f, "duplicate-entry"),
        }
    }
}

// ==========================================
// 导入状态标签 (Status Tag)
// ==========================================
// ImportStatus 的无负载形式，用于日志与 API 响应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTag {
    Idle,
    Running,
    Suspended,
    Done,
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusTag::Idle => write!(f, "idle"),
            StatusTag::Running => write!(f, "running"),
            StatusTag::Suspended => write!(f, "suspended"),
            StatusTag::Done => write!(f, "done"),
        }
    }
}
