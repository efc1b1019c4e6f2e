// ==========================================
// 车队运营后台 - 车队数据 Repository Trait
// ==========================================
// 职责: 导入引擎消费的持久化协作方接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{DailyEntry, Driver, NewDriver};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// FleetRepository Trait
// ==========================================
// 实现者: SqliteFleetRepository（rusqlite）/ InMemoryFleetRepository
#[async_trait]
pub trait FleetRepository: Send + Sync {
    // ===== 司机 =====

    /// 查询全部司机（含已离职，由调用方按在职状态过滤）
    async fn list_drivers(&self) -> RepositoryResult<Vec<Driver>>;

    /// 登记新司机
    ///
    /// # 返回
    /// - Ok(Driver): 带新生成 ID 的完整记录
    /// - Err(UniqueConstraintViolation): 姓名（大小写不敏感）或手机号已存在
    async fn create_driver(&self, driver: NewDriver) -> RepositoryResult<Driver>;

    // ===== 日报流水 =====

    /// 查询已落库流水（用于重复检测）
    async fn list_daily_entries(&self) -> RepositoryResult<Vec<DailyEntry>>;

    /// 批量插入流水（INSERT IF ABSENT 语义：已存在 ID 的记录跳过）
    ///
    /// # 返回
    /// - Ok(usize): 实际插入条数
    async fn bulk_insert_daily_entries(&self, entries: Vec<DailyEntry>) -> RepositoryResult<usize>;

    /// 按 ID 删除流水（ID 不存在时返回 Ok(false)）
    async fn delete_daily_entry(&self, id: &str) -> RepositoryResult<bool>;
}
