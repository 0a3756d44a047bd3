// ==========================================
// 运维事件报表导入系统 - 事件领域模型
// ==========================================
// 职责: 源数据行 / 类型化事件行 / 派生记录 / 导入结果信封
// 用途: 导入层写入，外部持久化协作方只读
// ==========================================

use crate::domain::cell::NormalizedCell;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// SourceField - 源数据行中的单列
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    pub key: String,    // 字段键（布局中声明）
    pub header: String, // 期望表头
    pub cell: NormalizedCell,
}

// ==========================================
// SourceRow - 源数据行
// ==========================================
// 生命周期: 仅在 RowExtractor → FieldMapper 之间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub row_number: usize,        // 工作表行号（1 起，表头为第 1 行）
    pub fields: Vec<SourceField>, // 按布局声明顺序
    pub category: Option<String>, // 前置分类标记行继承的类别
}

impl SourceRow {
    /// 按字段键取归一化单元格
    pub fn cell(&self, key: &str) -> Option<&NormalizedCell> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.cell)
    }

    /// 按字段键取去空白文本（缺失列视为空串）
    pub fn text(&self, key: &str) -> &str {
        self.cell(key).map(|c| c.trimmed()).unwrap_or("")
    }

    /// 按字段键取链接
    pub fn link(&self, key: &str) -> Option<&str> {
        self.cell(key).and_then(|c| c.link.as_deref())
    }
}

// ==========================================
// IncidentRow - 事件行（类型化中间结构）
// ==========================================
// 由 FieldMapper 产出，RecordDeriver 消费
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRow {
    pub row_number: usize,
    pub ticket_id: String,
    pub ticket_url: Option<String>,
    pub created_at_raw: String,
    pub application: String,
    pub summary: String,
    pub priority_raw: String,
    pub status_raw: String,
    pub additional_info: String,
    pub linked_request_id: Option<String>,
    pub linked_request_url: Option<String>,
    pub category: Option<String>,
    pub linked_count: Option<usize>, // 派生时已知的关联数（未知时为 None → 0）
}

// ==========================================
// DerivedRecord - 派生记录
// ==========================================
// 不变量: status == 待修复状态 时 additional_info == "unassigned"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRecord {
    // ===== 原始字段 =====
    pub row_number: usize,
    pub ticket_id: String,
    pub ticket_url: Option<String>,
    pub application: String,
    pub summary: String,
    pub category: Option<String>,
    pub status_raw: String,
    pub priority_raw: String,

    // ===== 分类结果 =====
    pub business_unit: String,
    pub status: String,   // 映射后状态
    pub priority: String, // 归一化优先级

    // ===== 时间派生 =====
    pub created_at: NaiveDateTime, // 业务时区本地时间
    pub in_window: bool,
    pub day_of_month: u32,
    pub week_number: u32, // ISO 周

    // ===== 关联 =====
    pub additional_info: String,
    pub linked_request_id: Option<String>,
    pub linked_request_url: Option<String>,
    pub linked_count: usize,
    pub message: String,

    // ===== 人工覆写 =====
    pub status_overridden: bool,
}

// ==========================================
// RowError - 行级错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

// ==========================================
// ImportSummary - 导入汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize, // 进入派生的数据行
    pub succeeded: usize,  // 成功派生
    pub rejected: usize,   // 业务单元 UNKNOWN 被剔除（警告）
    pub failed: usize,     // 校验失败（错误）
    pub warnings: usize,   // 警告条数
}

// ==========================================
// ImportEnvelope - 导入结果信封
// ==========================================
// 交给外部持久化协作方；本管道不负责存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEnvelope {
    pub batch_id: String,
    pub success: bool,
    pub records: Vec<DerivedRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<RowError>,
    pub summary: ImportSummary,
}

impl ImportEnvelope {
    /// 前 N 条错误/警告原文（错误在前）
    pub fn preview_messages(&self, limit: usize) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("行 {} [{}]: {}", e.row, e.field, e.message))
            .chain(self.warnings.iter().cloned())
            .take(limit)
            .collect()
    }
}
