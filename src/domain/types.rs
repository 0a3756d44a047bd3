// ==========================================
// 运维事件报表导入系统 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 优先级 (Priority Level)
// ==========================================
// 源表为西语四级，归一化为英文标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityLevel {
    /// 按归一化（小写、去重音）后的源文本识别
    pub fn from_folded(folded: &str) -> Option<Self> {
        match folded {
            "critica" | "critico" | "critical" => Some(PriorityLevel::Critical),
            "alta" | "alto" | "high" => Some(PriorityLevel::High),
            "media" | "medio" | "medium" => Some(PriorityLevel::Medium),
            "baja" | "bajo" | "low" => Some(PriorityLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityLevel::Critical => write!(f, "Critical"),
            PriorityLevel::High => write!(f, "High"),
            PriorityLevel::Medium => write!(f, "Medium"),
            PriorityLevel::Low => write!(f, "Low"),
        }
    }
}

// ==========================================
// 工作表类型 (Sheet Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SheetKind {
    Incidents, // 运维事件主表
    LinkPairs, // 父子工单关联
    Tags,      // 标签（带分类标记行）
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetKind::Incidents => write!(f, "INCIDENTS"),
            SheetKind::LinkPairs => write!(f, "LINK_PAIRS"),
            SheetKind::Tags => write!(f, "TAGS"),
        }
    }
}

// ==========================================
// 文件格式 (Workbook Format)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkbookFormat {
    Xlsx,
    Csv,
}

impl WorkbookFormat {
    /// 按扩展名识别（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(WorkbookFormat::Xlsx),
            "csv" => Some(WorkbookFormat::Csv),
            _ => None,
        }
    }
}
