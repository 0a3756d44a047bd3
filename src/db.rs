// ==========================================
// 运维事件报表导入系统 - SQLite 连接与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等建表，供 CLI 与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER NOT NULL,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS classification_rule (
    rule_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    purpose        TEXT NOT NULL,
    pattern        TEXT NOT NULL,
    pattern_type   TEXT NOT NULL,
    priority       INTEGER NOT NULL,
    target         TEXT NOT NULL,
    active         INTEGER NOT NULL DEFAULT 1,
    display_order  INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_classification_rule_order
    ON classification_rule (purpose, priority, display_order, rule_id);

CREATE TABLE IF NOT EXISTS import_batch (
    batch_id       TEXT PRIMARY KEY,
    file_name      TEXT,
    sheet_name     TEXT NOT NULL,
    success        INTEGER NOT NULL,
    total_rows     INTEGER NOT NULL,
    succeeded      INTEGER NOT NULL,
    rejected       INTEGER NOT NULL,
    failed         INTEGER NOT NULL,
    warnings_json  TEXT NOT NULL,
    errors_json    TEXT NOT NULL,
    imported_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS incident_record (
    record_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id            TEXT NOT NULL REFERENCES import_batch(batch_id) ON DELETE CASCADE,
    row_number          INTEGER NOT NULL,
    ticket_id           TEXT NOT NULL,
    ticket_url          TEXT,
    application         TEXT NOT NULL,
    summary             TEXT NOT NULL,
    category            TEXT,
    status_raw          TEXT NOT NULL,
    priority_raw        TEXT NOT NULL,
    business_unit       TEXT NOT NULL,
    status              TEXT NOT NULL,
    priority            TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    in_window           INTEGER NOT NULL,
    day_of_month        INTEGER NOT NULL,
    week_number         INTEGER NOT NULL,
    additional_info     TEXT NOT NULL,
    linked_request_id   TEXT,
    linked_request_url  TEXT,
    linked_count        INTEGER NOT NULL DEFAULT 0,
    message             TEXT NOT NULL,
    status_overridden   INTEGER NOT NULL DEFAULT 0,
    UNIQUE (batch_id, row_number)
);

CREATE INDEX IF NOT EXISTS idx_incident_record_ticket
    ON incident_record (ticket_id);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 均需"每个连接"单独设置
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

/// 幂等建表并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
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
