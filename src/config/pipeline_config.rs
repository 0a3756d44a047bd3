// ==========================================
// 运维事件报表导入系统 - 管道配置快照
// ==========================================
// 每次导入读取一次，导入期间不变
// ==========================================

use crate::domain::cut_window::{CalendarError, CalendarWindow};
use crate::engine::cut_calendar::DEFAULT_BUSINESS_TIMEZONE;
use crate::engine::record_deriver::DerivationPolicy;
use crate::importer::sheet_layout::{DEFAULT_INCIDENT_SHEET, DEFAULT_LINK_SHEET, DEFAULT_TAG_SHEET};

/// 默认消息预览条数
pub const DEFAULT_PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub business_timezone: String,
    pub backlog_status: String,
    pub unassigned_sentinel: String,
    pub awaiting_client_status: String,
    pub unknown_business_unit: String,
    pub preview_limit: usize,
    pub incident_sheet_name: String,
    pub link_sheet_name: String,
    pub tag_sheet_name: String,
    /// Err: 已存储的窗口无法解析（导入时告警并回退）
    pub cut_window: Result<Option<CalendarWindow>, CalendarError>,
}

impl PipelineConfig {
    pub fn derivation_policy(&self) -> DerivationPolicy {
        DerivationPolicy {
            backlog_status: self.backlog_status.clone(),
            unassigned_sentinel: self.unassigned_sentinel.clone(),
            awaiting_client_status: self.awaiting_client_status.clone(),
            unknown_business_unit: self.unknown_business_unit.clone(),
        }
    }

    pub fn with_cut_window(mut self, window: Option<CalendarWindow>) -> Self {
        self.cut_window = Ok(window);
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let policy = DerivationPolicy::default();
        Self {
            business_timezone: DEFAULT_BUSINESS_TIMEZONE.to_string(),
            backlog_status: policy.backlog_status,
            unassigned_sentinel: policy.unassigned_sentinel,
            awaiting_client_status: policy.awaiting_client_status,
            unknown_business_unit: policy.unknown_business_unit,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            incident_sheet_name: DEFAULT_INCIDENT_SHEET.to_string(),
            link_sheet_name: DEFAULT_LINK_SHEET.to_string(),
            tag_sheet_name: DEFAULT_TAG_SHEET.to_string(),
            cut_window: Ok(None),
        }
    }
}
