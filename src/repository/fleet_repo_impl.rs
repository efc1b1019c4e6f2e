// ==========================================
// 车队运营后台 - 车队数据 Repository 实现
// ==========================================
// 职责: 实现司机 / 日报流水数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{DailyEntry, Driver, DriverStatus, NewDriver};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fleet_repo::FleetRepository;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const DRIVER_COLUMNS: &str = "id, name, mobile, join_date, termination_date, deposit, \
                              qr_code, vehicle, status, current_shift";

const ENTRY_COLUMNS: &str =
    "id, date, day, vehicle, driver, shift, qr_code, rent, collection, fuel, due, payout, notes";

fn map_driver(row: &Row) -> rusqlite::Result<Driver> {
    let status: String = row.get(8)?;
    Ok(Driver {
        id: row.get(0)?,
        name: row.get(1)?,
        mobile: row.get(2)?,
        join_date: row.get(3)?,
        termination_date: row.get(4)?,
        deposit: row.get(5)?,
        qr_code: row.get(6)?,
        vehicle: row.get(7)?,
        status: DriverStatus::from_db_str(&status),
        current_shift: row.get(9)?,
    })
}

fn map_entry(row: &Row) -> rusqlite::Result<DailyEntry> {
    Ok(DailyEntry {
        id: row.get(0)?,
        date: row.get(1)?,
        day: row.get(2)?,
        vehicle: row.get(3)?,
        driver: row.get(4)?,
        shift: row.get(5)?,
        qr_code: row.get(6)?,
        rent: row.get(7)?,
        collection: row.get(8)?,
        fuel: row.get(9)?,
        due: row.get(10)?,
        payout: row.get(11)?,
        notes: row.get(12)?,
    })
}

// ==========================================
// SqliteFleetRepository
// ==========================================
pub struct SqliteFleetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFleetRepository {
    /// 创建新的 Repository 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存司机（按 ID UPSERT）
    ///
    /// 用于司机档案维护与测试数据准备；导入流程只使用 create_driver
    pub fn save_driver(&self, driver: &Driver) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO drivers (
                id, name, mobile, join_date, termination_date, deposit,
                qr_code, vehicle, status, current_shift
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                mobile = excluded.mobile,
                join_date = excluded.join_date,
                termination_date = excluded.termination_date,
                deposit = excluded.deposit,
                qr_code = excluded.qr_code,
                vehicle = excluded.vehicle,
                status = excluded.status,
                current_shift = excluded.current_shift
            "#,
            params![
                driver.id,
                driver.name,
                driver.mobile,
                driver.join_date,
                driver.termination_date,
                driver.deposit,
                driver.qr_code,
                driver.vehicle,
                driver.status.to_string(),
                driver.current_shift,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl FleetRepository for SqliteFleetRepository {
    async fn list_drivers(&self) -> RepositoryResult<Vec<Driver>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM drivers ORDER BY name",
            DRIVER_COLUMNS
        ))?;
        let drivers = stmt
            .query_map([], map_driver)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(drivers)
    }

    async fn create_driver(&self, driver: NewDriver) -> RepositoryResult<Driver> {
        let conn = self.lock()?;

        let clash: Option<String> = conn
            .query_row(
                "SELECT name FROM drivers \
                 WHERE lower(name) = lower(?1) OR (?2 <> '' AND mobile = ?2) LIMIT 1",
                params![driver.name.trim(), driver.mobile.trim()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = clash {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "司机姓名或手机号已存在: {}",
                existing
            )));
        }

        let created = NewDriver {
            name: driver.name.trim().to_string(),
            mobile: driver.mobile.trim().to_string(),
            join_date: driver.join_date,
        }
        .into_driver(Uuid::new_v4().to_string());

        conn.execute(
            r#"
            INSERT INTO drivers (
                id, name, mobile, join_date, termination_date, deposit,
                qr_code, vehicle, status, current_shift
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                created.id,
                created.name,
                created.mobile,
                created.join_date,
                created.termination_date,
                created.deposit,
                created.qr_code,
                created.vehicle,
                created.status.to_string(),
                created.current_shift,
            ],
        )?;

        debug!(driver_id = %created.id, name = %created.name, "司机登记完成");
        Ok(created)
    }

    async fn list_daily_entries(&self) -> RepositoryResult<Vec<DailyEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM daily_entries ORDER BY date DESC",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([], map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn bulk_insert_daily_entries(&self, entries: Vec<DailyEntry>) -> RepositoryResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO daily_entries ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                ENTRY_COLUMNS
            ))?;
            for e in &entries {
                inserted += stmt.execute(params![
                    e.id,
                    e.date,
                    e.day,
                    e.vehicle,
                    e.driver,
                    e.shift,
                    e.qr_code,
                    e.rent,
                    e.collection,
                    e.fuel,
                    e.due,
                    e.payout,
                    e.notes,
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!(requested = entries.len(), inserted, "日报流水批量插入完成");
        Ok(inserted)
    }

    async fn delete_daily_entry(&self, id: &str) -> RepositoryResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM daily_entries WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn setup() -> (NamedTempFile, SqliteFleetRepository) {
        let temp_file = NamedTempFile::new().unwrap();
        let repo = SqliteFleetRepository::new(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, repo)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, driver: &str) -> DailyEntry {
        DailyEntry {
            id: id.to_string(),
            date: date(2024, 1, 31),
            day: "Wednesday".to_string(),
            vehicle: "KA01".to_string(),
            driver: driver.to_string(),
            shift: "Day".to_string(),
            qr_code: "Q1".to_string(),
            rent: 900.0,
            collection: 1500.0,
            fuel: 200.0,
            due: 0.0,
            payout: 0.0,
            notes: Some("Imported".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_driver_rejects_duplicate_name() {
        let (_tmp, repo) = setup();
        let new_driver = NewDriver {
            name: "John".to_string(),
            mobile: "9000000001".to_string(),
            join_date: date(2024, 1, 1),
        };

        let created = repo.create_driver(new_driver).await.unwrap();
        assert!(!created.id.is_empty());
        assert!(created.is_active());

        let clash = repo
            .create_driver(NewDriver {
                name: "JOHN".to_string(),
                mobile: String::new(),
                join_date: date(2024, 1, 2),
            })
            .await;
        assert!(matches!(
            clash,
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));

        let drivers = repo.list_drivers().await.unwrap();
        assert_eq!(drivers.len(), 1);
    }

    #[tokio::test]
    async fn test_create_driver_rejects_duplicate_mobile() {
        let (_tmp, repo) = setup();
        repo.create_driver(NewDriver {
            name: "John".to_string(),
            mobile: "9000000001".to_string(),
            join_date: date(2024, 1, 1),
        })
        .await
        .unwrap();

        let clash = repo
            .create_driver(NewDriver {
                name: "Ravi".to_string(),
                mobile: "9000000001".to_string(),
                join_date: date(2024, 1, 1),
            })
            .await;
        assert!(clash.is_err());
    }

    #[tokio::test]
    async fn test_bulk_insert_is_insert_if_absent() {
        let (_tmp, repo) = setup();

        let inserted = repo
            .bulk_insert_daily_entries(vec![entry("E1", "John"), entry("E2", "Ravi")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        // 重复 ID 不覆盖、不报错
        let mut changed = entry("E1", "John");
        changed.rent = 1.0;
        let inserted = repo
            .bulk_insert_daily_entries(vec![changed, entry("E3", "Mani")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let entries = repo.list_daily_entries().await.unwrap();
        assert_eq!(entries.len(), 3);
        let e1 = entries.iter().find(|e| e.id == "E1").unwrap();
        assert_eq!(e1.rent, 900.0);
        assert_eq!(e1.date, date(2024, 1, 31));
    }

    #[tokio::test]
    async fn test_delete_daily_entry() {
        let (_tmp, repo) = setup();
        repo.bulk_insert_daily_entries(vec![entry("E1", "John")])
            .await
            .unwrap();

        assert!(repo.delete_daily_entry("E1").await.unwrap());
        assert!(!repo.delete_daily_entry("E1").await.unwrap());
        assert!(repo.list_daily_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_driver_round_trips_termination() {
        let (_tmp, repo) = setup();
        let mut driver = NewDriver {
            name: "Old Timer".to_string(),
            mobile: String::new(),
            join_date: date(2023, 5, 1),
        }
        .into_driver("D-OLD".to_string());
        driver.status = DriverStatus::Terminated;
        driver.termination_date = Some(date(2023, 12, 31));
        repo.save_driver(&driver).unwrap();

        let drivers = repo.list_drivers().await.unwrap();
        assert_eq!(drivers, vec![driver]);
        assert!(!drivers[0].is_active());
    }
}
