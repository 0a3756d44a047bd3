// ==========================================
// 运维事件报表导入系统 - 引擎层
// ==========================================
// 职责: 单元格归一化、规则分类、截止窗口、记录派生、关联聚合
// 红线: Engine 不做 I/O，不拼 SQL；规则与窗口均为只读快照
// ==========================================

pub mod cell_normalizer;
pub mod cut_calendar;
pub mod linkage_aggregator;
pub mod record_deriver;
pub mod rule_engine;
pub mod text_norm;

// 重导出核心引擎
pub use cell_normalizer::CellNormalizer;
pub use cut_calendar::{CutCalendar, WindowPolicy, DEFAULT_BUSINESS_TIMEZONE};
pub use linkage_aggregator::LinkageAggregator;
pub use record_deriver::{DerivationError, DerivationPolicy, RecordDeriver};
pub use rule_engine::{Classification, CompiledRuleSet, RuleEngine, RuleWarning};
