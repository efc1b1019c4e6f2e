// ==========================================
// 车队运营后台 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{FleetRepository, SqliteFleetRepository};

/// 应用状态
///
/// 包含API实例和共享资源，持久化仓储与配置共用一条连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 司机 / 日报流水仓储
    pub fleet_repo: Arc<SqliteFleetRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 日报导入API
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let fleet_repo = Arc::new(SqliteFleetRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let store: Arc<dyn FleetRepository> = fleet_repo.clone();
        let import_api = Arc::new(
            ImportApi::from_config(store, config_manager.as_ref())
                .await
                .map_err(|e| format!("无法创建ImportApi: {}", e))?,
        );

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            fleet_repo,
            config_manager,
            import_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先读取环境变量 FLEET_IMPORT_DB_PATH；否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("FLEET_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./fleet_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("fleet-import");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("fleet_import.db");
        }
    }

    path.to_string_lossy().to_string()
}
