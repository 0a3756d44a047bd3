// ==========================================
// 运维事件报表导入系统 - 记录派生引擎
// ==========================================
// 职责: IncidentRow + 规则快照 + 截止窗口 → DerivedRecord
// 顺序: 必填校验 → 业务单元 → 时间解析 → 窗口/日/周 → 状态映射
//       → 优先级 → 待修复不变量 → 关联摘要
// 红线: 时间戳不可解析、待修复冲突为行级硬失败，只剔除该行
// ==========================================

use crate::domain::incident::{DerivedRecord, IncidentRow};
use crate::domain::rule::RuleSet;
use crate::domain::types::PriorityLevel;
use crate::engine::cut_calendar::{CutCalendar, WindowPolicy};
use crate::engine::rule_engine::{CompiledRuleSet, RuleWarning};
use crate::engine::text_norm::{fold_for_match, normalize_for_match};
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

/// 创建时间的源格式（首个为主格式）
pub const CREATED_AT_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

// ==========================================
// DerivationError - 行级派生错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("必填字段为空: {field}")]
    MissingField { field: String },

    #[error("业务单元无法识别: {application}")]
    UnknownBusinessUnit { application: String },

    #[error("创建时间格式错误: 期望 DD/MM/YYYY HH:MM，实际 {value}")]
    InvalidTimestamp { value: String },

    #[error("待修复状态要求附加信息为空或 {sentinel}，实际为 {value}")]
    BacklogConflict { value: String, sentinel: String },

    #[error("仅原始状态为 {required} 的记录允许覆写，当前为 {status}")]
    OverrideNotPermitted { status: String, required: String },

    #[error("记录已被覆写过状态: {ticket_id}")]
    AlreadyOverridden { ticket_id: String },
}

impl DerivationError {
    /// 出错字段名（用于 RowError）
    pub fn field(&self) -> &str {
        match self {
            DerivationError::MissingField { field } => field,
            DerivationError::UnknownBusinessUnit { .. } => "application",
            DerivationError::InvalidTimestamp { .. } => "created_at",
            DerivationError::BacklogConflict { .. } => "additional_info",
            DerivationError::OverrideNotPermitted { .. }
            | DerivationError::AlreadyOverridden { .. } => "status",
        }
    }

    /// 是否为"分类回退剔除"（计入 rejected + 警告，而非错误）
    pub fn is_rejection(&self) -> bool {
        matches!(self, DerivationError::UnknownBusinessUnit { .. })
    }
}

// ==========================================
// DerivationPolicy - 派生策略常量
// ==========================================
// 来源: PipelineConfig 快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPolicy {
    pub backlog_status: String,
    pub unassigned_sentinel: String,
    pub awaiting_client_status: String,
    pub unknown_business_unit: String,
}

impl Default for DerivationPolicy {
    fn default() -> Self {
        Self {
            backlog_status: "Backlog".to_string(),
            unassigned_sentinel: "unassigned".to_string(),
            awaiting_client_status: "En espera de cliente".to_string(),
            unknown_business_unit: "UNKNOWN".to_string(),
        }
    }
}

impl DerivationPolicy {
    fn is_backlog(&self, status: &str) -> bool {
        normalize_for_match(status) == normalize_for_match(&self.backlog_status)
    }

    /// 待修复不变量
    ///
    /// # 返回
    /// - 待修复: Ok(sentinel) 或 Err(BacklogConflict)
    /// - 其他状态: 原值（去首尾空白）
    pub fn enforce_backlog(&self, status: &str, additional_info: &str) -> Result<String, DerivationError> {
        let info = additional_info.trim();
        if !self.is_backlog(status) {
            return Ok(info.to_string());
        }
        if info.is_empty() || info.eq_ignore_ascii_case(&self.unassigned_sentinel) {
            Ok(self.unassigned_sentinel.clone())
        } else {
            Err(DerivationError::BacklogConflict {
                value: info.to_string(),
                sentinel: self.unassigned_sentinel.clone(),
            })
        }
    }

    /// 人工状态覆写（每条记录仅一次）
    ///
    /// # 规则
    /// - 原始状态必须为"等待客户"
    /// - 已覆写过的记录拒绝再次覆写
    /// - 覆写为待修复状态同样受附加信息不变量约束
    pub fn apply_status_override(
        &self,
        record: &mut DerivedRecord,
        new_status: &str,
    ) -> Result<(), DerivationError> {
        if record.status_overridden {
            return Err(DerivationError::AlreadyOverridden {
                ticket_id: record.ticket_id.clone(),
            });
        }
        if normalize_for_match(&record.status_raw) != normalize_for_match(&self.awaiting_client_status) {
            return Err(DerivationError::OverrideNotPermitted {
                status: record.status_raw.clone(),
                required: self.awaiting_client_status.clone(),
            });
        }

        let additional_info = self.enforce_backlog(new_status, &record.additional_info)?;
        record.status = new_status.trim().to_string();
        record.additional_info = additional_info;
        record.status_overridden = true;
        Ok(())
    }
}

// ==========================================
// RecordDeriver - 记录派生引擎
// ==========================================
// 持有一次导入的只读快照（规则已编译）
pub struct RecordDeriver {
    business_units: CompiledRuleSet,
    statuses: CompiledRuleSet,
    calendar: CutCalendar,
    window: WindowPolicy,
    policy: DerivationPolicy,
}

impl RecordDeriver {
    pub fn new(
        business_unit_rules: &RuleSet,
        status_rules: &RuleSet,
        calendar: CutCalendar,
        window: WindowPolicy,
        policy: DerivationPolicy,
    ) -> Self {
        Self {
            business_units: CompiledRuleSet::from_rule_set(business_unit_rules),
            statuses: CompiledRuleSet::from_rule_set(status_rules),
            calendar,
            window,
            policy,
        }
    }

    pub fn policy(&self) -> &DerivationPolicy {
        &self.policy
    }

    pub fn window(&self) -> &WindowPolicy {
        &self.window
    }

    pub fn calendar(&self) -> &CutCalendar {
        &self.calendar
    }

    /// 两套规则编译期的全部告警
    pub fn rule_warnings(&self) -> Vec<RuleWarning> {
        self.business_units
            .warnings()
            .iter()
            .chain(self.statuses.warnings())
            .cloned()
            .collect()
    }

    /// 规则驱动的业务单元识别（未命中返回 UNKNOWN 码）
    pub fn classify_business_unit(&self, application: &str) -> String {
        self.business_units
            .classify_or(application, &self.policy.unknown_business_unit)
    }

    /// 使用内置规则集完成派生
    pub fn derive(&self, row: &IncidentRow) -> Result<DerivedRecord, DerivationError> {
        check_required(row)?;
        let business_unit = self.classify_business_unit(&row.application);
        self.derive_classified(row, &business_unit)
    }

    /// 使用外部已给出的业务单元完成派生
    ///
    /// # 参数
    /// - business_unit: 外部分类器（可能异步）的结果
    pub fn derive_classified(
        &self,
        row: &IncidentRow,
        business_unit: &str,
    ) -> Result<DerivedRecord, DerivationError> {
        check_required(row)?;

        // 1. 业务单元
        let business_unit = business_unit.trim();
        if business_unit.is_empty() || business_unit == self.policy.unknown_business_unit {
            return Err(DerivationError::UnknownBusinessUnit {
                application: row.application.clone(),
            });
        }

        // 2. 创建时间
        let created_at = parse_created_at(&row.created_at_raw, self.calendar.timezone())?;

        // 3. 窗口归属 / 日 / ISO 周
        let in_window = self.window.contains(&self.calendar, &created_at);
        let day_of_month = created_at.day();
        let week_number = created_at.iso_week().week();

        // 4. 状态映射（未命中保留原文）
        let status = self.statuses.classify_or(&row.status_raw, &row.status_raw);

        // 5. 优先级
        let priority = normalize_priority(&row.priority_raw);

        // 6. 待修复不变量
        let additional_info = self.policy.enforce_backlog(&status, &row.additional_info)?;

        // 7. 关联数与摘要
        let linked_count = row.linked_count.unwrap_or(0);
        let message = summary_message(row.linked_request_id.as_deref(), linked_count);

        Ok(DerivedRecord {
            row_number: row.row_number,
            ticket_id: row.ticket_id.clone(),
            ticket_url: row.ticket_url.clone(),
            application: row.application.clone(),
            summary: row.summary.clone(),
            category: row.category.clone(),
            status_raw: row.status_raw.clone(),
            priority_raw: row.priority_raw.clone(),
            business_unit: business_unit.to_string(),
            status,
            priority,
            created_at: created_at.naive_local(),
            in_window,
            day_of_month,
            week_number,
            additional_info,
            linked_request_id: row.linked_request_id.clone(),
            linked_request_url: row.linked_request_url.clone(),
            linked_count,
            message,
            status_overridden: false,
        })
    }
}

fn check_required(row: &IncidentRow) -> Result<(), DerivationError> {
    if row.ticket_id.trim().is_empty() {
        return Err(DerivationError::MissingField {
            field: "ticket_id".to_string(),
        });
    }
    if row.application.trim().is_empty() {
        return Err(DerivationError::MissingField {
            field: "application".to_string(),
        });
    }
    Ok(())
}

/// 解析创建时间（业务时区本地时间）
///
/// DST 重叠取较早时刻；落在 DST 空隙内视为不可解析
pub fn parse_created_at(raw: &str, tz: Tz) -> Result<DateTime<Tz>, DerivationError> {
    let value = raw.trim();
    let invalid = || DerivationError::InvalidTimestamp {
        value: raw.to_string(),
    };

    let naive = CREATED_AT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(invalid)?;

    tz.from_local_datetime(&naive).earliest().ok_or_else(invalid)
}

/// 优先级归一化: 四级源词汇 → 英文标签，其余原样透传
pub fn normalize_priority(raw: &str) -> String {
    PriorityLevel::from_folded(&fold_for_match(raw))
        .map(|p| p.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// 关联摘要: "<linkedId|N/A> --> <count> Linked tickets"
///
/// 既无关联工单号又无关联数时为空串
pub fn summary_message(linked_request_id: Option<&str>, linked_count: usize) -> String {
    let linked_id = linked_request_id.map(str::trim).filter(|id| !id.is_empty());
    if linked_id.is_none() && linked_count == 0 {
        return String::new();
    }
    format!("{} --> {} Linked tickets", linked_id.unwrap_or("N/A"), linked_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cut_window::{CalendarWindow, WindowKind};
    use chrono::NaiveDate;

    fn sample_row() -> IncidentRow {
        IncidentRow {
            row_number: 2,
            ticket_id: "REQ-1001".to_string(),
            ticket_url: None,
            created_at_raw: "19/09/2025 10:00".to_string(),
            application: "Somos Belcorp 2.0".to_string(),
            summary: "Error al cargar pedidos".to_string(),
            priority_raw: "Alta".to_string(),
            status_raw: "Nivel 3".to_string(),
            additional_info: String::new(),
            linked_request_id: None,
            linked_request_url: None,
            category: None,
            linked_count: None,
        }
    }

    fn weekly_deriver() -> RecordDeriver {
        let window = CalendarWindow::new(
            NaiveDate::from_ymd_opt(2025, 9, 19).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 25).unwrap(),
            WindowKind::Weekly,
        );
        RecordDeriver::new(
            &RuleSet::default_business_units(),
            &RuleSet::default_status_mappings(),
            CutCalendar::default(),
            WindowPolicy::Explicit(window),
            DerivationPolicy::default(),
        )
    }

    #[test]
    fn test_derive_happy_path() {
        let record = weekly_deriver().derive(&sample_row()).unwrap();

        assert_eq!(record.business_unit, "SB");
        assert_eq!(record.status, "On going in L3");
        assert_eq!(record.priority, "High");
        assert!(record.in_window);
        assert_eq!(record.day_of_month, 19);
        assert_eq!(record.week_number, 38);
        assert_eq!(record.message, "");
        assert_eq!(record.linked_count, 0);
        assert_eq!(
            record.created_at,
            NaiveDate::from_ymd_opt(2025, 9, 19)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_unknown_business_unit_is_rejection() {
        let mut row = sample_row();
        row.application = "Sistema interno".to_string();
        let err = weekly_deriver().derive(&row).unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(err.field(), "application");
    }

    #[test]
    fn test_missing_required_fields() {
        let mut row = sample_row();
        row.ticket_id = "  ".to_string();
        let err = weekly_deriver().derive(&row).unwrap_err();
        assert_eq!(err, DerivationError::MissingField { field: "ticket_id".to_string() });

        let mut row = sample_row();
        row.application = String::new();
        let err = weekly_deriver().derive(&row).unwrap_err();
        assert_eq!(err.field(), "application");
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_invalid_timestamp_is_hard_failure() {
        let mut row = sample_row();
        row.created_at_raw = "2025/19/09".to_string();
        let err = weekly_deriver().derive(&row).unwrap_err();
        assert!(matches!(err, DerivationError::InvalidTimestamp { .. }));
        assert_eq!(err.field(), "created_at");
    }

    #[test]
    fn test_alternate_timestamp_formats() {
        let tz = chrono_tz::America::Lima;
        assert!(parse_created_at("19/09/2025 10:00:30", tz).is_ok());
        assert!(parse_created_at("2025-09-19T10:00:00", tz).is_ok());
        assert!(parse_created_at("19-09-2025", tz).is_err());
    }

    #[test]
    fn test_out_of_window() {
        let mut row = sample_row();
        row.created_at_raw = "26/09/2025 00:00".to_string();
        let record = weekly_deriver().derive(&row).unwrap();
        assert!(!record.in_window);
        assert_eq!(record.week_number, 39);
    }

    #[test]
    fn test_status_falls_back_to_raw() {
        let mut row = sample_row();
        row.status_raw = "Escalado a proveedor".to_string();
        let record = weekly_deriver().derive(&row).unwrap();
        assert_eq!(record.status, "Escalado a proveedor");
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(normalize_priority("Crítica"), "Critical");
        assert_eq!(normalize_priority(" MEDIA "), "Medium");
        assert_eq!(normalize_priority("baja"), "Low");
        assert_eq!(normalize_priority("Urgente"), "Urgente");
    }

    #[test]
    fn test_backlog_invariant() {
        let deriver = weekly_deriver();

        let mut row = sample_row();
        row.status_raw = "Pendiente de fix".to_string();
        row.additional_info = "Sprint 42".to_string();
        let err = deriver.derive(&row).unwrap_err();
        assert_eq!(
            err,
            DerivationError::BacklogConflict {
                value: "Sprint 42".to_string(),
                sentinel: "unassigned".to_string()
            }
        );

        row.additional_info = String::new();
        let record = deriver.derive(&row).unwrap();
        assert_eq!(record.status, "Backlog");
        assert_eq!(record.additional_info, "unassigned");

        row.additional_info = "Unassigned".to_string();
        assert_eq!(deriver.derive(&row).unwrap().additional_info, "unassigned");
    }

    #[test]
    fn test_summary_message() {
        assert_eq!(summary_message(None, 0), "");
        assert_eq!(summary_message(Some("  "), 0), "");
        assert_eq!(summary_message(Some("REQ-9"), 0), "REQ-9 --> 0 Linked tickets");
        assert_eq!(summary_message(None, 3), "N/A --> 3 Linked tickets");
    }

    #[test]
    fn test_supplied_linked_count() {
        let mut row = sample_row();
        row.linked_request_id = Some("REQ-500".to_string());
        row.linked_count = Some(2);
        let record = weekly_deriver().derive(&row).unwrap();
        assert_eq!(record.linked_count, 2);
        assert_eq!(record.message, "REQ-500 --> 2 Linked tickets");
    }

    #[test]
    fn test_external_classification_result() {
        let deriver = weekly_deriver();
        let record = deriver.derive_classified(&sample_row(), "EXT").unwrap();
        assert_eq!(record.business_unit, "EXT");

        let err = deriver.derive_classified(&sample_row(), "UNKNOWN").unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_status_override_once_for_awaiting_client() {
        let deriver = weekly_deriver();
        let policy = deriver.policy().clone();

        let mut row = sample_row();
        row.status_raw = "En espera de cliente".to_string();
        let mut record = deriver.derive(&row).unwrap();
        assert_eq!(record.status, "Awaiting client");

        policy.apply_status_override(&mut record, "Resolved").unwrap();
        assert_eq!(record.status, "Resolved");
        assert!(record.status_overridden);

        let err = policy.apply_status_override(&mut record, "Backlog").unwrap_err();
        assert!(matches!(err, DerivationError::AlreadyOverridden { .. }));
    }

    #[test]
    fn test_status_override_rejected_for_other_status() {
        let deriver = weekly_deriver();
        let mut record = deriver.derive(&sample_row()).unwrap();
        let err = deriver
            .policy()
            .apply_status_override(&mut record, "Resolved")
            .unwrap_err();
        assert!(matches!(err, DerivationError::OverrideNotPermitted { .. }));
        assert_eq!(record.status, "On going in L3");
        assert!(!record.status_overridden);
    }

    #[test]
    fn test_current_week_fallback_policy() {
        let now = chrono_tz::America::Lima
            .with_ymd_and_hms(2025, 9, 24, 12, 0, 0)
            .unwrap();
        let deriver = RecordDeriver::new(
            &RuleSet::default_business_units(),
            &RuleSet::default_status_mappings(),
            CutCalendar::default(),
            WindowPolicy::CurrentWeek { now },
            DerivationPolicy::default(),
        );

        // 周五 09-19 在截止周期内，但不在 09-22 ~ 09-28 自然周内
        assert!(!deriver.derive(&sample_row()).unwrap().in_window);

        let mut row = sample_row();
        row.created_at_raw = "22/09/2025 08:00".to_string();
        assert!(deriver.derive(&row).unwrap().in_window);
    }
}
