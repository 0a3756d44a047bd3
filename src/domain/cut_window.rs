// ==========================================
// 运维事件报表导入系统 - 截止窗口领域模型
// ==========================================
// 职责: 截止周期窗口（周五~周四）定义与错误类型
// 红线: 每次重新配置都必须重新校验不变量
// ==========================================

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 周期起始日
pub const WINDOW_START_WEEKDAY: Weekday = Weekday::Fri;
/// 周期结束日
pub const WINDOW_END_WEEKDAY: Weekday = Weekday::Thu;
/// 周窗口最大跨度（天，含首尾）
pub const MAX_WEEKLY_SPAN_DAYS: i64 = 30;

/// 窗口日期字符串格式
pub const WINDOW_DATE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// WindowKind - 窗口类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Weekly,   // 周五~周四固定锚点
    Custom,   // 仅要求 from < to
    Disabled, // 不限制，所有日期均在窗口内
}

impl WindowKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "weekly" => Some(WindowKind::Weekly),
            "custom" => Some(WindowKind::Custom),
            "disabled" => Some(WindowKind::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKind::Weekly => write!(f, "weekly"),
            WindowKind::Custom => write!(f, "custom"),
            WindowKind::Disabled => write!(f, "disabled"),
        }
    }
}

// ==========================================
// CalendarError - 窗口校验错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("日期格式错误 (字段 {field}): 期望 YYYY-MM-DD，实际 {value}")]
    MalformedDate { field: String, value: String },

    #[error("窗口起止颠倒: from={from} 不早于 to={to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },

    #[error("窗口起始日必须为周五: {date} 是 {weekday}")]
    WrongStartWeekday { date: NaiveDate, weekday: Weekday },

    #[error("窗口结束日必须为周四: {date} 是 {weekday}")]
    WrongEndWeekday { date: NaiveDate, weekday: Weekday },

    #[error("窗口跨度过长: {days} 天 (上限 {max} 天)")]
    SpanTooLong { days: i64, max: i64 },

    #[error("未知业务时区: {0}")]
    UnknownTimezone(String),

    #[error("未知窗口类型: {0}（期望 weekly / custom / disabled）")]
    UnknownKind(String),
}

// ==========================================
// CalendarWindow - 截止窗口
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub kind: WindowKind,
}

impl CalendarWindow {
    pub fn new(from_date: NaiveDate, to_date: NaiveDate, kind: WindowKind) -> Self {
        Self {
            from_date,
            to_date,
            kind,
        }
    }

    pub fn disabled() -> Self {
        // 边界对 disabled 无意义，仅占位
        let epoch = NaiveDate::default();
        Self::new(epoch, epoch, WindowKind::Disabled)
    }

    /// 从字符串构造（不做不变量校验，见 CutCalendar::validate）
    pub fn parse(from: &str, to: &str, kind: WindowKind) -> Result<Self, CalendarError> {
        let from_date = parse_window_date("from_date", from)?;
        let to_date = parse_window_date("to_date", to)?;
        Ok(Self::new(from_date, to_date, kind))
    }

    /// 含首尾的天数: to - from + 1
    pub fn duration_days(&self) -> i64 {
        (self.to_date - self.from_date).num_days() + 1
    }

    pub fn is_disabled(&self) -> bool {
        self.kind == WindowKind::Disabled
    }
}

impl fmt::Display for CalendarWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disabled() {
            return write!(f, "disabled");
        }
        write!(
            f,
            "{}..={} ({})",
            self.from_date.format(WINDOW_DATE_FORMAT),
            self.to_date.format(WINDOW_DATE_FORMAT),
            self.kind
        )
    }
}

fn parse_window_date(field: &str, value: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(value.trim(), WINDOW_DATE_FORMAT).map_err(|_| {
        CalendarError::MalformedDate {
            field: field.to_string(),
            value: value.to_string(),
        }
    })
}
