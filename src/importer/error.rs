// ==========================================
// 运维事件报表导入系统 - 导入模块错误类型
// ==========================================
// 规则: 此处均为结构性错误，中止整个文件；行级错误见 DerivationError
// ==========================================

use crate::domain::cut_window::CalendarError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 工作表结构错误 =====
    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    #[error("工作表无表头行: {0}")]
    EmptySheet(String),

    #[error("表头列数不足 (工作表 {sheet}): 期望至少 {expected} 列，实际 {actual} 列")]
    HeaderCountMismatch {
        sheet: String,
        expected: usize,
        actual: usize,
    },

    #[error("列字母非法: {0}")]
    InvalidColumnLetter(String),

    // ===== 数据库错误 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("截止窗口无效: {0}")]
    InvalidWindow(#[from] CalendarError),

    // ===== 外部协作方错误 =====
    #[error("业务单元分类器失败 (行 {row}): {message}")]
    ClassifierError { row: usize, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
