// ==========================================
// 车队运营后台 - 校验快照
// ==========================================
// 职责: 导入开始时从持久化层读取司机 / 已落库流水，作为校验的一致视图
// 刷新: 仅在冲突处理登记新司机时追加
// ==========================================

use crate::domain::{DailyEntry, Driver};
use crate::repository::{FleetRepository, RepositoryResult};
use chrono::NaiveDate;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ValidationSnapshot {
    drivers: Vec<Driver>,
    existing_entries: Vec<DailyEntry>,
}

impl ValidationSnapshot {
    pub fn new(drivers: Vec<Driver>, existing_entries: Vec<DailyEntry>) -> Self {
        Self {
            drivers,
            existing_entries,
        }
    }

    /// 从持久化层加载
    pub async fn load(store: &dyn FleetRepository) -> RepositoryResult<Self> {
        let drivers = store.list_drivers().await?;
        let existing_entries = store.list_daily_entries().await?;
        Ok(Self::new(drivers, existing_entries))
    }

    /// 在职司机查找（姓名大小写不敏感）
    pub fn find_active_driver(&self, name: &str) -> Option<&Driver> {
        self.drivers
            .iter()
            .find(|d| d.is_active() && d.name_matches(name))
    }

    pub fn has_active_driver(&self, name: &str) -> bool {
        self.find_active_driver(name).is_some()
    }

    /// 已落库的同日同司机流水（排除已标记覆盖的 ID）
    pub fn find_persisted_duplicate(
        &self,
        date: NaiveDate,
        driver: &str,
        overridden: &BTreeSet<String>,
    ) -> Option<&DailyEntry> {
        self.existing_entries
            .iter()
            .find(|e| e.same_slot(date, driver) && !overridden.contains(&e.id))
    }

    /// 追加新登记的司机
    pub fn register(&mut self, driver: Driver) {
        self.drivers.push(driver);
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn entry_count(&self) -> usize {
        self.existing_entries.len()
    }
}
