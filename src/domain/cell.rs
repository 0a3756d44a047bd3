// ==========================================
// 运维事件报表导入系统 - 单元格领域模型
// ==========================================
// 职责: 定义原始单元格形态（封闭和类型）与归一化结果
// 红线: 每种原始形态只携带自身相关字段，不设"任意对象"兜底分支
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// RichTextRun - 富文本片段
// ==========================================
// text 缺失的片段按空串拼接，不报错
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextRun {
    pub text: Option<String>,
}

impl RichTextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// 无文本片段（部分读取器对纯格式片段会给出空 text）
    pub fn empty() -> Self {
        Self { text: None }
    }
}

// ==========================================
// HyperlinkText - 超链接包裹的可见文本
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HyperlinkText {
    Plain(String),
    Rich(Vec<RichTextRun>),
}

// ==========================================
// RawCellValue - 原始单元格值
// ==========================================
// 由外部表格读取器产出，不可变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RawCellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    RichText(Vec<RichTextRun>),
    Hyperlink {
        url: String,
        text: HyperlinkText,
    },
    Formula {
        formula: String,
        result: Box<RawCellValue>,
    },
}

impl RawCellValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawCellValue::Text(value.into())
    }

    pub fn hyperlink(url: impl Into<String>, text: impl Into<String>) -> Self {
        RawCellValue::Hyperlink {
            url: url.into(),
            text: HyperlinkText::Plain(text.into()),
        }
    }

    pub fn formula(formula: impl Into<String>, result: RawCellValue) -> Self {
        RawCellValue::Formula {
            formula: formula.into(),
            result: Box::new(result),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawCellValue::Empty)
    }
}

// ==========================================
// NormalizedCell - 归一化单元格
// ==========================================
// 不变量: text 永远是字符串（空单元格为 ""）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCell {
    pub text: String,
    pub link: Option<String>,
}

impl NormalizedCell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
        }
    }

    pub fn linked(text: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: Some(link.into()),
        }
    }

    /// 去除首尾空白后是否为空
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// 去除首尾空白后的文本
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }
}
