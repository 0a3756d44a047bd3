// ==========================================
// 运维事件报表导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id='global')
// 规则: 截止窗口写入前必须校验不变量
// ==========================================

use crate::config::pipeline_config::DEFAULT_PREVIEW_LIMIT;
use crate::config::pipeline_config_trait::{ConfigError, ConfigResult, PipelineConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::cut_window::{CalendarError, CalendarWindow, WindowKind, WINDOW_DATE_FORMAT};
use crate::engine::cut_calendar::{CutCalendar, DEFAULT_BUSINESS_TIMEZONE};
use crate::engine::record_deriver::DerivationPolicy;
use crate::importer::sheet_layout::{DEFAULT_INCIDENT_SHEET, DEFAULT_LINK_SHEET, DEFAULT_TAG_SHEET};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn lock(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 删除 global scope 的配置值
    pub fn delete_global_config_value(&self, key: &str) -> ConfigResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 所有 global 配置的快照（JSON，按 key 排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 截止窗口 =====

    /// 重新配置截止窗口（先校验，再写入）
    pub fn set_cut_window(&self, window: &CalendarWindow) -> ConfigResult<()> {
        let timezone = self.get_config_or_default(config_keys::BUSINESS_TIMEZONE, DEFAULT_BUSINESS_TIMEZONE)?;
        let calendar = CutCalendar::from_name(&timezone)?;
        calendar.validate(window)?;

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        for (key, value) in [
            (config_keys::CUT_WINDOW_FROM, window.from_date.format(WINDOW_DATE_FORMAT).to_string()),
            (config_keys::CUT_WINDOW_TO, window.to_date.format(WINDOW_DATE_FORMAT).to_string()),
            (config_keys::CUT_WINDOW_KIND, window.kind.to_string()),
        ] {
            tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        tx.commit()?;

        info!(window = %window, "截止窗口已更新");
        Ok(())
    }

    /// 清除截止窗口（导入回退为当前自然周）
    pub fn clear_cut_window(&self) -> ConfigResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key IN (?1, ?2, ?3)",
            params![
                config_keys::CUT_WINDOW_FROM,
                config_keys::CUT_WINDOW_TO,
                config_keys::CUT_WINDOW_KIND
            ],
        )?;
        Ok(())
    }
}

// ==========================================
// PipelineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PipelineConfigReader for ConfigManager {
    async fn get_business_timezone(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::BUSINESS_TIMEZONE, DEFAULT_BUSINESS_TIMEZONE)?;
        // 非法时区在此处拦截，避免进入派生阶段
        CutCalendar::from_name(&value).map_err(|e| ConfigError::InvalidValue {
            key: config_keys::BUSINESS_TIMEZONE.to_string(),
            value: value.clone(),
            message: e.to_string(),
        })?;
        Ok(value)
    }

    async fn get_backlog_status(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::BACKLOG_STATUS, &DerivationPolicy::default().backlog_status)
    }

    async fn get_unassigned_sentinel(&self) -> ConfigResult<String> {
        self.get_config_or_default(
            config_keys::UNASSIGNED_SENTINEL,
            &DerivationPolicy::default().unassigned_sentinel,
        )
    }

    async fn get_awaiting_client_status(&self) -> ConfigResult<String> {
        self.get_config_or_default(
            config_keys::AWAITING_CLIENT_STATUS,
            &DerivationPolicy::default().awaiting_client_status,
        )
    }

    async fn get_unknown_business_unit(&self) -> ConfigResult<String> {
        self.get_config_or_default(
            config_keys::UNKNOWN_BUSINESS_UNIT,
            &DerivationPolicy::default().unknown_business_unit,
        )
    }

    async fn get_preview_limit(&self) -> ConfigResult<usize> {
        let value = self.get_config_or_default(
            config_keys::PREVIEW_LIMIT,
            &DEFAULT_PREVIEW_LIMIT.to_string(),
        )?;
        Ok(value.parse::<usize>().unwrap_or_else(|_| {
            warn!(config_key = config_keys::PREVIEW_LIMIT, raw_value = %value, "预览条数配置格式错误，使用默认值");
            DEFAULT_PREVIEW_LIMIT
        }))
    }

    async fn get_incident_sheet_name(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::INCIDENT_SHEET_NAME, DEFAULT_INCIDENT_SHEET)
    }

    async fn get_link_sheet_name(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::LINK_SHEET_NAME, DEFAULT_LINK_SHEET)
    }

    async fn get_tag_sheet_name(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::TAG_SHEET_NAME, DEFAULT_TAG_SHEET)
    }

    async fn get_cut_window(&self) -> ConfigResult<Option<CalendarWindow>> {
        let from = self.get_global_config_value(config_keys::CUT_WINDOW_FROM)?;
        let to = self.get_global_config_value(config_keys::CUT_WINDOW_TO)?;
        let kind_raw = self.get_global_config_value(config_keys::CUT_WINDOW_KIND)?;

        let kind = match kind_raw.as_deref() {
            None => WindowKind::Weekly,
            Some(raw) => WindowKind::parse(raw)
                .ok_or_else(|| ConfigError::InvalidWindow(CalendarError::UnknownKind(raw.to_string())))?,
        };

        if kind == WindowKind::Disabled {
            return Ok(Some(CalendarWindow::disabled()));
        }

        match (from, to) {
            (Some(from), Some(to)) => Ok(Some(CalendarWindow::parse(&from, &to, kind)?)),
            _ => Ok(None),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 时区
    pub const BUSINESS_TIMEZONE: &str = "business_timezone";

    // 派生策略
    pub const BACKLOG_STATUS: &str = "backlog_status";
    pub const UNASSIGNED_SENTINEL: &str = "unassigned_sentinel";
    pub const AWAITING_CLIENT_STATUS: &str = "awaiting_client_status";
    pub const UNKNOWN_BUSINESS_UNIT: &str = "unknown_business_unit";

    // 结果展示
    pub const PREVIEW_LIMIT: &str = "preview_limit";

    // 工作表名
    pub const INCIDENT_SHEET_NAME: &str = "incident_sheet_name";
    pub const LINK_SHEET_NAME: &str = "link_sheet_name";
    pub const TAG_SHEET_NAME: &str = "tag_sheet_name";

    // 截止窗口（YYYY-MM-DD / weekly|custom|disabled）
    pub const CUT_WINDOW_FROM: &str = "cut_window_from";
    pub const CUT_WINDOW_TO: &str = "cut_window_to";
    pub const CUT_WINDOW_KIND: &str = "cut_window_kind";
}
