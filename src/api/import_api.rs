// ==========================================
// 事件报表导入API
// ==========================================
// 职责: 组装 配置 + 规则仓储 + 导入器 + 记录仓储
// 说明: 所有组件共用同一个 SQLite 连接
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, PipelineConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::cut_window::{CalendarWindow, WindowKind};
use crate::domain::incident::{DerivedRecord, ImportEnvelope};
use crate::domain::linkage::{LinkGroup, TagGroups};
use crate::domain::rule::{ClassificationRule, RulePurpose};
use crate::engine::cut_calendar::CutCalendar;
use crate::engine::rule_engine::RuleEngine;
use crate::importer::{IncidentImporter, IncidentImporterImpl, LinkageImporter, Workbook};
use crate::repository::{
    ClassificationRuleRepository, ImportBatchRecord, IncidentRecordRepository, StoredIncident,
    StoredRule,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::info;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 结果信封
    pub envelope: ImportEnvelope,
    /// 前 N 条错误/警告原文
    pub preview: Vec<String>,
    /// 实际落库的记录数（未落库为 0）
    pub persisted: usize,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    clock: Option<DateTime<Utc>>,
}

impl ImportApi {
    /// 打开数据库并建表
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: None,
        })
    }

    /// 固定"当前时间"（回退窗口与默认周期按此计算）
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    fn config(&self) -> ApiResult<ConfigManager> {
        Ok(ConfigManager::from_connection(self.conn.clone())?)
    }

    fn rules(&self) -> ClassificationRuleRepository {
        ClassificationRuleRepository::from_connection(self.conn.clone())
    }

    fn records(&self) -> IncidentRecordRepository {
        IncidentRecordRepository::from_connection(self.conn.clone())
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 导入事件报表
    ///
    /// # 参数
    /// - file_path: .xlsx / .xlsm / .csv
    /// - persist: 是否将结果落库
    pub async fn import_file(&self, file_path: &str, persist: bool) -> ApiResult<ImportApiResponse> {
        let start = Instant::now();
        let config = self.config()?;
        let preview_limit = config.get_preview_limit().await?;
        let sheet_name = config.get_incident_sheet_name().await?;

        let mut importer = IncidentImporterImpl::new(config, self.rules());
        if let Some(now) = self.clock {
            importer = importer.with_clock(now);
        }
        let envelope = importer.import_file(file_path).await?;

        let persisted = if persist {
            let file_name = Path::new(file_path)
                .file_name()
                .and_then(|n| n.to_str());
            self.records().save_envelope(&envelope, file_name, &sheet_name)?
        } else {
            0
        };

        info!(batch_id = %envelope.batch_id, persisted, "导入请求处理完成");
        Ok(ImportApiResponse {
            preview: envelope.preview_messages(preview_limit),
            envelope,
            persisted,
            elapsed_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// 父子工单分组视图
    pub async fn link_groups(&self, file_path: &str) -> ApiResult<Vec<LinkGroup>> {
        let sheet_name = self.config()?.get_link_sheet_name().await?;
        let workbook = Workbook::open(file_path)?;
        Ok(LinkageImporter.link_groups(&workbook, &sheet_name)?)
    }

    /// 标签分组视图
    pub async fn tag_groups(&self, file_path: &str) -> ApiResult<TagGroups> {
        let sheet_name = self.config()?.get_tag_sheet_name().await?;
        let workbook = Workbook::open(file_path)?;
        Ok(LinkageImporter.tag_groups(&workbook, &sheet_name)?)
    }

    // ==========================================
    // 批次与记录
    // ==========================================

    pub fn get_batch(&self, batch_id: &str) -> ApiResult<ImportBatchRecord> {
        self.records()
            .find_batch(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("导入批次(id={})不存在", batch_id)))
    }

    pub fn list_batch_records(&self, batch_id: &str) -> ApiResult<Vec<StoredIncident>> {
        Ok(self.records().list_by_batch(batch_id)?)
    }

    /// 人工状态覆写（仅"等待客户"原始状态，每条一次）
    pub async fn override_status(&self, record_id: i64, new_status: &str) -> ApiResult<DerivedRecord> {
        if new_status.trim().is_empty() {
            return Err(ApiError::InvalidInput("新状态不能为空".to_string()));
        }
        let policy = self.config()?.snapshot().await?.derivation_policy();
        Ok(self
            .records()
            .apply_status_override(record_id, new_status, &policy)?)
    }

    pub fn delete_batch(&self, batch_id: &str) -> ApiResult<()> {
        Ok(self.records().delete_batch(batch_id)?)
    }

    // ==========================================
    // 配置
    // ==========================================

    pub fn set_config(&self, key: &str, value: &str) -> ApiResult<()> {
        Ok(self.config()?.set_global_config_value(key, value)?)
    }

    pub fn config_snapshot(&self) -> ApiResult<String> {
        Ok(self.config()?.get_config_snapshot()?)
    }

    /// 重新配置截止窗口（写入前校验）
    pub fn set_cut_window(&self, from: &str, to: &str, kind: &str) -> ApiResult<CalendarWindow> {
        let kind = WindowKind::parse(kind)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知窗口类型: {}", kind)))?;
        let window = if kind == WindowKind::Disabled {
            CalendarWindow::disabled()
        } else {
            CalendarWindow::parse(from, to, kind).map_err(|e| ApiError::InvalidInput(e.to_string()))?
        };
        self.config()?.set_cut_window(&window)?;
        Ok(window)
    }

    pub fn clear_cut_window(&self) -> ApiResult<()> {
        Ok(self.config()?.clear_cut_window()?)
    }

    /// 以当前时间计算默认周五~周四窗口并写入
    pub async fn reset_cut_window_to_current_cycle(&self) -> ApiResult<CalendarWindow> {
        let config = self.config()?;
        let calendar = CutCalendar::from_name(&config.get_business_timezone().await?)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        let now = self.clock.unwrap_or_else(Utc::now);
        let window = calendar.compute_default_weekly(&now);
        config.set_cut_window(&window)?;
        Ok(window)
    }

    // ==========================================
    // 分类规则
    // ==========================================

    /// 新增规则（模式不可用时拒绝写入）
    pub fn create_rule(&self, purpose: RulePurpose, rule: &ClassificationRule) -> ApiResult<i64> {
        validate_rule(rule)?;
        Ok(self.rules().create(purpose, rule)?)
    }

    pub fn update_rule(&self, rule_id: i64, rule: &ClassificationRule) -> ApiResult<()> {
        validate_rule(rule)?;
        Ok(self.rules().update(rule_id, rule)?)
    }

    pub fn set_rule_active(&self, rule_id: i64, active: bool) -> ApiResult<()> {
        Ok(self.rules().set_active(rule_id, active)?)
    }

    pub fn delete_rule(&self, rule_id: i64) -> ApiResult<()> {
        Ok(self.rules().delete(rule_id)?)
    }

    pub fn list_rules(&self, purpose: RulePurpose) -> ApiResult<Vec<StoredRule>> {
        Ok(self.rules().list_by_purpose(purpose, true)?)
    }

    /// 为空的规则用途写入默认规则
    pub fn seed_default_rules(&self) -> ApiResult<usize> {
        let rules = self.rules();
        Ok(rules.seed_defaults(RulePurpose::BusinessUnit)?
            + rules.seed_defaults(RulePurpose::StatusMapping)?)
    }
}

fn validate_rule(rule: &ClassificationRule) -> ApiResult<()> {
    if rule.pattern.trim().is_empty() || rule.target.trim().is_empty() {
        return Err(ApiError::InvalidInput("规则模式与目标值不能为空".to_string()));
    }
    RuleEngine
        .validate_pattern(&rule.pattern, rule.pattern_type)
        .map_err(ApiError::InvalidInput)
}
