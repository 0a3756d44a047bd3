// ==========================================
// 运维事件报表导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 运维报表 → 派生记录（落库由持久化协作方负责）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 归一化 / 分类 / 窗口 / 派生 / 关联
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    CalendarWindow, ClassificationRule, DerivedRecord, ImportEnvelope, ImportSummary,
    NormalizedCell, RawCellValue, RowError, RuleSet, WindowKind,
};

// 引擎
pub use engine::{
    CellNormalizer, CutCalendar, LinkageAggregator, RecordDeriver, RuleEngine, WindowPolicy,
};

// 导入
pub use importer::{IncidentImporter, IncidentImporterImpl, Workbook};

// API
pub use api::ImportApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "运维事件报表导入系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
