// ==========================================
// 运维事件报表导入系统 - 导入层
// ==========================================
// 职责: 工作簿读取、行抽取、字段映射、导入编排
// 支持: .xlsx / .xlsm / .csv
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod header_matcher;
pub mod incident_importer_impl;
pub mod incident_importer_trait;
pub mod linkage_importer;
pub mod row_extractor;
pub mod sheet_layout;
pub mod workbook;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use header_matcher::{HeaderMatchReport, HeaderMatcher, HeaderProbe, HEADER_MATCH_THRESHOLD};
pub use incident_importer_impl::IncidentImporterImpl;
pub use linkage_importer::{LinkageImporter, LinkageOutcome};
pub use row_extractor::{ExtractionStats, RowExtractor};
pub use sheet_layout::{column_index, ColumnSpec, SheetLayout};
pub use workbook::{Sheet, Workbook};

// 重导出 Trait 接口
pub use incident_importer_trait::{
    BusinessUnitClassifier, DefaultRuleSource, IncidentImporter, RuleBasedClassifier,
    RuleSetSource,
};
