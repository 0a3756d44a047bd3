// ==========================================
// 运维事件报表导入系统 - 管道配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::pipeline_config::PipelineConfig;
use crate::domain::cut_window::{CalendarError, CalendarWindow};
use async_trait::async_trait;
use thiserror::Error;

// ==========================================
// ConfigError - 配置层错误
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置数据库访问失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("锁获取失败: {0}")]
    Lock(String),

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("截止窗口配置无效: {0}")]
    InvalidWindow(#[from] CalendarError),

    #[error("配置序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    /// 业务时区（IANA 名称）
    ///
    /// # 默认值
    /// - America/Lima
    async fn get_business_timezone(&self) -> ConfigResult<String>;

    /// 待修复状态（映射后）
    ///
    /// # 默认值
    /// - Backlog
    async fn get_backlog_status(&self) -> ConfigResult<String>;

    /// 附加信息哨兵值
    ///
    /// # 默认值
    /// - unassigned
    async fn get_unassigned_sentinel(&self) -> ConfigResult<String>;

    /// 允许人工覆写的原始状态
    ///
    /// # 默认值
    /// - En espera de cliente
    async fn get_awaiting_client_status(&self) -> ConfigResult<String>;

    /// 业务单元未识别码
    ///
    /// # 默认值
    /// - UNKNOWN
    async fn get_unknown_business_unit(&self) -> ConfigResult<String>;

    /// 结果信封中展示的消息条数上限
    ///
    /// # 默认值
    /// - 20
    async fn get_preview_limit(&self) -> ConfigResult<usize>;

    /// 事件主表工作表名
    async fn get_incident_sheet_name(&self) -> ConfigResult<String>;

    /// 父子关联工作表名
    async fn get_link_sheet_name(&self) -> ConfigResult<String>;

    /// 标签工作表名
    async fn get_tag_sheet_name(&self) -> ConfigResult<String>;

    /// 已配置的截止窗口
    ///
    /// # 返回
    /// - Ok(None): 未配置（调用方回退到当前自然周）
    /// - Err(InvalidWindow): 已存储但日期格式错误
    async fn get_cut_window(&self) -> ConfigResult<Option<CalendarWindow>>;

    /// 一次导入使用的不可变配置快照
    async fn snapshot(&self) -> ConfigResult<PipelineConfig> {
        let cut_window = match self.get_cut_window().await {
            Ok(window) => Ok(window),
            Err(ConfigError::InvalidWindow(e)) => Err(e),
            Err(e) => return Err(e),
        };

        Ok(PipelineConfig {
            business_timezone: self.get_business_timezone().await?,
            backlog_status: self.get_backlog_status().await?,
            unassigned_sentinel: self.get_unassigned_sentinel().await?,
            awaiting_client_status: self.get_awaiting_client_status().await?,
            unknown_business_unit: self.get_unknown_business_unit().await?,
            preview_limit: self.get_preview_limit().await?,
            incident_sheet_name: self.get_incident_sheet_name().await?,
            link_sheet_name: self.get_link_sheet_name().await?,
            tag_sheet_name: self.get_tag_sheet_name().await?,
            cut_window,
        })
    }
}
