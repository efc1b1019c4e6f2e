// ==========================================
// 车队运营后台 - 内存版车队数据 Repository
// ==========================================
// 用途: 单元测试 / 无数据库的演示场景
// 语义与 SqliteFleetRepository 保持一致（唯一性、INSERT IF ABSENT）
// ==========================================

use crate::domain::{DailyEntry, Driver, NewDriver};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fleet_repo::FleetRepository;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Store {
    drivers: Vec<Driver>,
    entries: Vec<DailyEntry>,
}

#[derive(Debug, Default)]
pub struct InMemoryFleetRepository {
    store: Mutex<Store>,
    fail_writes: AtomicBool,
}

impl InMemoryFleetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置司机与流水
    pub fn with_data(drivers: Vec<Driver>, entries: Vec<DailyEntry>) -> Self {
        Self {
            store: Mutex::new(Store { drivers, entries }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// 打开后所有写操作返回事务错误（模拟落库失败）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn check_writable(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseTransactionError(
                "写入已被禁用".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl FleetRepository for InMemoryFleetRepository {
    async fn list_drivers(&self) -> RepositoryResult<Vec<Driver>> {
        Ok(self.lock()?.drivers.clone())
    }

    async fn create_driver(&self, driver: NewDriver) -> RepositoryResult<Driver> {
        self.check_writable()?;
        let mut store = self.lock()?;

        let name = driver.name.trim().to_string();
        let mobile = driver.mobile.trim().to_string();
        if let Some(existing) = store
            .drivers
            .iter()
            .find(|d| d.name_matches(&name) || (!mobile.is_empty() && d.mobile == mobile))
        {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "司机姓名或手机号已存在: {}",
                existing.name
            )));
        }

        let created = NewDriver {
            name,
            mobile,
            join_date: driver.join_date,
        }
        .into_driver(Uuid::new_v4().to_string());
        store.drivers.push(created.clone());
        Ok(created)
    }

    async fn list_daily_entries(&self) -> RepositoryResult<Vec<DailyEntry>> {
        Ok(self.lock()?.entries.clone())
    }

    async fn bulk_insert_daily_entries(&self, entries: Vec<DailyEntry>) -> RepositoryResult<usize> {
        self.check_writable()?;
        let mut store = self.lock()?;

        let mut inserted = 0;
        for entry in entries {
            if store.entries.iter().any(|e| e.id == entry.id) {
                continue;
            }
            store.entries.push(entry);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_daily_entry(&self, id: &str) -> RepositoryResult<bool> {
        self.check_writable()?;
        let mut store = self.lock()?;
        let before = store.entries.len();
        store.entries.retain(|e| e.id != id);
        Ok(store.entries.len() < before)
    }
}
