// ==========================================
// 运维事件报表导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod cell;
pub mod cut_window;
pub mod incident;
pub mod linkage;
pub mod rule;
pub mod types;

// 重导出核心类型
pub use cell::{HyperlinkText, NormalizedCell, RawCellValue, RichTextRun};
pub use cut_window::{CalendarError, CalendarWindow, WindowKind};
pub use incident::{
    DerivedRecord, ImportEnvelope, ImportSummary, IncidentRow, RowError, SourceField, SourceRow,
};
pub use linkage::{
    LabelRequests, LinkGroup, ParentChildPair, RequestRef, TagGroup, TagGroups, TagRow,
};
pub use rule::{ClassificationRule, PatternType, RulePurpose, RuleSet};
pub use types::{PriorityLevel, SheetKind, WorkbookFormat};
