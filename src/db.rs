// ==========================================
// 车队运营后台 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供导入引擎依赖的最小 schema（司机 / 日报流水 / 配置）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// drivers 上的 lower(name) 唯一索引保证姓名大小写不敏感唯一
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS drivers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            mobile TEXT NOT NULL DEFAULT '',
            join_date TEXT NOT NULL,
            termination_date TEXT,
            deposit REAL NOT NULL DEFAULT 0,
            qr_code TEXT NOT NULL DEFAULT '',
            vehicle TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'Active',
            current_shift TEXT NOT NULL DEFAULT 'Day'
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_drivers_name_ci ON drivers (lower(name));

        CREATE TABLE IF NOT EXISTS daily_entries (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            day TEXT NOT NULL DEFAULT '',
            vehicle TEXT NOT NULL DEFAULT '',
            driver TEXT NOT NULL,
            shift TEXT NOT NULL DEFAULT '',
            qr_code TEXT NOT NULL DEFAULT '',
            rent REAL NOT NULL DEFAULT 0,
            collection REAL NOT NULL DEFAULT 0,
            fuel REAL NOT NULL DEFAULT 0,
            due REAL NOT NULL DEFAULT 0,
            payout REAL NOT NULL DEFAULT 0,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_daily_entries_slot ON daily_entries (date, lower(driver));

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
