// ==========================================
// 车队运营后台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::config::import_settings::ImportSettings;
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取正整数配置，缺失或非法时返回默认值
    fn get_usize_or_default(&self, key: &str, default: usize) -> ConfigResult<usize> {
        let value = self.get_config_value(key)?;
        Ok(value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default))
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_header_scan_rows(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(
            config_keys::HEADER_SCAN_ROWS,
            ImportSettings::default().header_scan_rows,
        )
    }

    async fn get_min_header_matches(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(
            config_keys::MIN_HEADER_MATCHES,
            ImportSettings::default().min_header_matches,
        )
    }

    async fn get_max_garbage_streak(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(
            config_keys::MAX_GARBAGE_STREAK,
            ImportSettings::default().max_garbage_streak,
        )
    }

    async fn get_section_markers(&self) -> ConfigResult<Vec<String>> {
        let defaults = ImportSettings::default().section_markers;
        let raw = match self.get_config_value(config_keys::SECTION_MARKERS)? {
            Some(v) => v,
            None => return Ok(defaults),
        };

        // 配置格式为 JSON 数组: ["total", "profit"]
        let markers: Vec<String> = serde_json::from_str::<Vec<String>>(&raw)
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        if markers.is_empty() {
            Ok(defaults)
        } else {
            Ok(markers)
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 表头定位
    pub const HEADER_SCAN_ROWS: &str = "import_header_scan_rows";
    pub const MIN_HEADER_MATCHES: &str = "import_min_header_matches";

    // 行抽取
    pub const MAX_GARBAGE_STREAK: &str = "import_max_garbage_streak";
    pub const SECTION_MARKERS: &str = "import_section_markers"; // JSON 数组
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let manager = manager();
        let settings = manager.load_import_settings().await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_values() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::HEADER_SCAN_ROWS, "50")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MAX_GARBAGE_STREAK, "abc")
            .unwrap();
        manager
            .set_global_config_value(config_keys::SECTION_MARKERS, r#"["Grand Total", " "]"#)
            .unwrap();

        let settings = manager.load_import_settings().await.unwrap();
        assert_eq!(settings.header_scan_rows, 50);
        assert_eq!(settings.max_garbage_streak, 3);
        assert_eq!(settings.section_markers, vec!["grand total".to_string()]);
    }

    #[tokio::test]
    async fn test_set_is_upsert() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::MIN_HEADER_MATCHES, "4")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MIN_HEADER_MATCHES, "5")
            .unwrap();
        assert_eq!(
            manager
                .get_global_config_value(config_keys::MIN_HEADER_MATCHES)
                .unwrap(),
            Some("5".to_string())
        );
        assert_eq!(manager.get_min_header_matches().await.unwrap(), 5);
    }
}
