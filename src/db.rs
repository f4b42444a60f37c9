// ==========================================
// 疫苗接种排期 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout：同一儿童的"判定-落库"串行化时，
//   后到的写事务在此时间内等待而不是立即失败
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "VACCINE_SCHEDULER_DB_PATH";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    configure_sqlite_connection_with_timeout(conn, DEFAULT_BUSY_TIMEOUT_MS)
}

pub fn configure_sqlite_connection_with_timeout(
    conn: &Connection,
    busy_timeout_ms: u64,
) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等）
///
/// 说明：
/// - vaccination_record 只追加；UNIQUE(child_id, vaccine_id, dose_number) 是并发落库的最后防线
/// - interval_rule 对同一有序疫苗对（related 为空视为自身规则）唯一
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS vaccination_record (
            record_id TEXT PRIMARY KEY,
            child_id TEXT NOT NULL,
            vaccine_id TEXT NOT NULL,
            administered_on TEXT NOT NULL,
            dose_number INTEGER NOT NULL CHECK (dose_number >= 1),
            reaction_notes TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(child_id, vaccine_id, dose_number)
        );

        CREATE INDEX IF NOT EXISTS idx_vaccination_record_child
            ON vaccination_record(child_id, administered_on);

        CREATE TABLE IF NOT EXISTS interval_rule (
            rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
            vaccine_id TEXT NOT NULL,
            related_vaccine_id TEXT,
            min_interval_days INTEGER NOT NULL CHECK (min_interval_days >= 0),
            can_be_given_together INTEGER NOT NULL DEFAULT 0
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_interval_rule_pair
            ON interval_rule(vaccine_id, IFNULL(related_vaccine_id, ''));
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

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径
///
/// 优先级: 环境变量 VACCINE_SCHEDULER_DB_PATH > 用户数据目录 > 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./vaccine_scheduler.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("clinic-vaccine-scheduler");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("vaccine_scheduler.db");
        }
    }

    path.to_string_lossy().to_string()
}
