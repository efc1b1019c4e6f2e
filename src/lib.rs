// ==========================================
// 车队运营后台 - 日报导入核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 第三方日报表格导入与对账（人工处理冲突）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 导入阈值
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    CanonicalRow, Conflict, ConflictDetail, ConflictKind, DailyEntry, Driver, FinalizeReport,
    ImportState, ImportStatus, SkippedRow, StatusTag,
};

// 导入
pub use importer::{ImportError, ImportSession, Resolution, RunOutcome};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "车队运营后台 - 日报导入";
