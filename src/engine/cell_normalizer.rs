// ==========================================
// 运维事件报表导入系统 - 单元格归一化器
// ==========================================
// 职责: 任意原始单元格形态 → (text, link?) 规范表示
// 红线: 纯函数、全覆盖、不抛错；text 永不为 null
// ==========================================

use crate::domain::cell::{HyperlinkText, NormalizedCell, RawCellValue, RichTextRun};

/// 日期单元格的固定 ISO-8601 文本格式
pub const CELL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct CellNormalizer;

impl CellNormalizer {
    /// 链接感知路径: 返回文本与超链接
    ///
    /// # 规则
    /// - 空 → ("", None)
    /// - 字符串/数字/布尔/日期 → 确定性字符串化，无链接
    /// - 富文本 → 各片段按序拼接（无分隔符）
    /// - 超链接 → link = URL；text = 可见文本（可为富文本，递归解析）
    /// - 公式 → 解包 result 后递归
    pub fn normalize(&self, raw: &RawCellValue) -> NormalizedCell {
        match raw {
            RawCellValue::Hyperlink { url, text } => {
                let visible = self.hyperlink_text(text);
                let link = Some(url.trim())
                    .filter(|u| !u.is_empty())
                    .map(str::to_string);
                NormalizedCell {
                    // 可见文本为空时才退回链接目标
                    text: if visible.trim().is_empty() {
                        link.clone().unwrap_or_default()
                    } else {
                        visible
                    },
                    link,
                }
            }
            RawCellValue::Formula { result, .. } => self.normalize(result),
            other => NormalizedCell::plain(self.normalize_text(other)),
        }
    }

    /// 纯文本路径: 只取文本，丢弃链接
    pub fn normalize_text(&self, raw: &RawCellValue) -> String {
        match raw {
            RawCellValue::Empty => String::new(),
            RawCellValue::Text(s) => s.clone(),
            RawCellValue::Number(n) => format_number(*n),
            RawCellValue::Bool(b) => b.to_string(),
            RawCellValue::DateTime(dt) => dt.format(CELL_DATETIME_FORMAT).to_string(),
            RawCellValue::RichText(runs) => concat_runs(runs),
            RawCellValue::Hyperlink { .. } => self.normalize(raw).text,
            RawCellValue::Formula { result, .. } => self.normalize_text(result),
        }
    }

    fn hyperlink_text(&self, text: &HyperlinkText) -> String {
        match text {
            HyperlinkText::Plain(s) => s.clone(),
            HyperlinkText::Rich(runs) => concat_runs(runs),
        }
    }
}

fn concat_runs(runs: &[RichTextRun]) -> String {
    runs.iter()
        .map(|run| run.text.as_deref().unwrap_or(""))
        .collect()
}

/// 数字的默认十进制表示（整数值不带小数点）
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
