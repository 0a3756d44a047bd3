// ==========================================
// 运维事件报表导入系统 - 配置层
// ==========================================
// 职责: 管道配置读取与截止窗口重配置
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod pipeline_config;
pub mod pipeline_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use pipeline_config::{PipelineConfig, DEFAULT_PREVIEW_LIMIT};
pub use pipeline_config_trait::{ConfigError, ConfigResult, PipelineConfigReader};
