// ==========================================
// 运维事件报表导入系统 - 截止周期日历
// ==========================================
// 规则: 周窗口为 周五 00:00 ~ 周四 23:59:59（业务时区），首尾均包含
// 规则: disabled 窗口对所有日期返回 true
// ==========================================

use crate::domain::cut_window::{
    CalendarError, CalendarWindow, WindowKind, MAX_WEEKLY_SPAN_DAYS, WINDOW_END_WEEKDAY,
    WINDOW_START_WEEKDAY,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;

/// 默认业务时区
pub const DEFAULT_BUSINESS_TIMEZONE: &str = "America/Lima";

// ==========================================
// CutCalendar - 绑定业务时区的窗口计算器
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct CutCalendar {
    tz: Tz,
}

impl CutCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// 按 IANA 名称构造（如 "America/Lima"）
    pub fn from_name(name: &str) -> Result<Self, CalendarError> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// 任意时刻在业务时区下的日历日期
    pub fn local_date<T: TimeZone>(&self, instant: &DateTime<T>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// 校验窗口不变量
    ///
    /// # 规则
    /// - disabled: 不校验
    /// - custom: from < to
    /// - weekly: from < to，from 为周五，to 为周四，跨度 ≤ 30 天
    pub fn validate(&self, window: &CalendarWindow) -> Result<(), CalendarError> {
        if window.kind == WindowKind::Disabled {
            return Ok(());
        }

        if window.from_date >= window.to_date {
            return Err(CalendarError::InvertedRange {
                from: window.from_date,
                to: window.to_date,
            });
        }

        if window.kind == WindowKind::Weekly {
            let start = window.from_date.weekday();
            if start != WINDOW_START_WEEKDAY {
                return Err(CalendarError::WrongStartWeekday {
                    date: window.from_date,
                    weekday: start,
                });
            }

            let end = window.to_date.weekday();
            if end != WINDOW_END_WEEKDAY {
                return Err(CalendarError::WrongEndWeekday {
                    date: window.to_date,
                    weekday: end,
                });
            }

            let days = window.duration_days();
            if days > MAX_WEEKLY_SPAN_DAYS {
                return Err(CalendarError::SpanTooLong {
                    days,
                    max: MAX_WEEKLY_SPAN_DAYS,
                });
            }
        }

        Ok(())
    }

    /// 判断时刻是否落在窗口内
    ///
    /// 按业务时区日期比较，等价于 [from 00:00:00, to 23:59:59.999] 闭区间
    pub fn contains<T: TimeZone>(&self, window: &CalendarWindow, probe: &DateTime<T>) -> bool {
        if window.is_disabled() {
            return true;
        }
        let date = self.local_date(probe);
        date >= window.from_date && date <= window.to_date
    }

    /// 计算默认周窗口
    ///
    /// # 规则
    /// - to = 今天或之前最近的周四（今天早于周四则取上周四）
    /// - from = to - 6 天（周五）
    pub fn compute_default_weekly<T: TimeZone>(&self, now: &DateTime<T>) -> CalendarWindow {
        let today = self.local_date(now);
        let offset = (today.weekday().num_days_from_monday() + 7
            - WINDOW_END_WEEKDAY.num_days_from_monday())
            % 7;
        let to_date = today - Duration::days(i64::from(offset));
        let from_date = to_date - Duration::days(6);
        CalendarWindow::new(from_date, to_date, WindowKind::Weekly)
    }

    /// 当前自然周（周一 ~ 周日）的起止日期
    pub fn current_week_bounds<T: TimeZone>(&self, now: &DateTime<T>) -> (NaiveDate, NaiveDate) {
        let today = self.local_date(now);
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        (monday, monday + Duration::days(6))
    }

    /// 回退策略: 时刻是否在"当前自然周"内
    pub fn current_week_contains<T: TimeZone, U: TimeZone>(
        &self,
        now: &DateTime<T>,
        probe: &DateTime<U>,
    ) -> bool {
        let (monday, sunday) = self.current_week_bounds(now);
        let date = self.local_date(probe);
        date >= monday && date <= sunday
    }
}

impl Default for CutCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::America::Lima)
    }
}

// ==========================================
// WindowPolicy - 窗口归属判定策略
// ==========================================
// 显式窗口与"当前自然周"回退在周边界会得出不同结论，二者不可互换
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowPolicy {
    /// 已配置且校验通过的窗口
    Explicit(CalendarWindow),
    /// 未配置窗口: 以 now 所在自然周（周一~周日）判定
    CurrentWeek { now: DateTime<Tz> },
}

impl WindowPolicy {
    pub fn is_fallback(&self) -> bool {
        matches!(self, WindowPolicy::CurrentWeek { .. })
    }

    /// 按策略判定时刻归属
    pub fn contains<T: TimeZone>(&self, calendar: &CutCalendar, probe: &DateTime<T>) -> bool {
        match self {
            WindowPolicy::Explicit(window) => calendar.contains(window, probe),
            WindowPolicy::CurrentWeek { now } => calendar.current_week_contains(now, probe),
        }
    }

    /// 回退策略的分歧告警（显式窗口返回 None）
    ///
    /// 同时给出自然周范围与同一时刻的默认周五~周四窗口
    pub fn divergence_warning(&self, calendar: &CutCalendar) -> Option<String> {
        let WindowPolicy::CurrentWeek { now } = self else {
            return None;
        };
        let (monday, sunday) = calendar.current_week_bounds(now);
        let weekly = calendar.compute_default_weekly(now);
        Some(format!(
            "未配置截止窗口，回退为当前自然周 {}..={}；默认截止周期为 {}，两者在周边界处结论可能不同",
            monday, sunday, weekly
        ))
    }
}
