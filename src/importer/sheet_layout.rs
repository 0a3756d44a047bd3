// ==========================================
// 运维事件报表导入系统 - 工作表布局
// ==========================================
// 职责: 每种工作表的 列字母 → 表头 → 字段键 声明
// 规则: 第 1 行固定为表头；按列字母定位，表头仅做校验
// ==========================================

use crate::domain::types::SheetKind;
use crate::importer::error::{ImportError, ImportResult};

/// 字段键
pub mod keys {
    pub const TICKET_ID: &str = "ticket_id";
    pub const CREATED_AT: &str = "created_at";
    pub const APPLICATION: &str = "application";
    pub const SUMMARY: &str = "summary";
    pub const PRIORITY: &str = "priority";
    pub const STATUS: &str = "status";
    pub const ADDITIONAL_INFO: &str = "additional_info";
    pub const LINKED_REQUEST: &str = "linked_request_id";
    pub const PARENT_ID: &str = "parent_id";
    pub const CHILD_ID: &str = "child_id";
    pub const REQUEST_ID: &str = "request_id";
}

/// 默认工作表名
pub const DEFAULT_INCIDENT_SHEET: &str = "Reporte";
pub const DEFAULT_LINK_SHEET: &str = "Enlaces";
pub const DEFAULT_TAG_SHEET: &str = "Etiquetas";

/// 分类标记行关键词（去重音小写后按词元匹配）
pub const MARKER_KEYWORDS: &[&str] = &[
    "bug",
    "error",
    "errors",
    "informational",
    "informativo",
    "mejora",
    "improvement",
    "consulta",
];

// ==========================================
// ColumnSpec - 列声明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub letter: String,
    pub header: String,
    pub key: String,
    pub link: bool, // 链接列走链接感知归一化
}

impl ColumnSpec {
    pub fn text(letter: &str, header: &str, key: &str) -> Self {
        Self {
            letter: letter.to_string(),
            header: header.to_string(),
            key: key.to_string(),
            link: false,
        }
    }

    pub fn link(letter: &str, header: &str, key: &str) -> Self {
        Self {
            link: true,
            ..Self::text(letter, header, key)
        }
    }
}

/// 已解析列下标的列声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub spec: ColumnSpec,
}

// ==========================================
// SheetLayout - 工作表布局
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub kind: SheetKind,
    pub sheet_name: String,
    pub columns: Vec<ColumnSpec>,
    pub marker_keywords: Vec<String>, // 为空表示该表无分类标记行
}

impl SheetLayout {
    /// 运维事件主表
    pub fn incidents() -> Self {
        Self {
            kind: SheetKind::Incidents,
            sheet_name: DEFAULT_INCIDENT_SHEET.to_string(),
            columns: vec![
                ColumnSpec::link("A", "Ticket", keys::TICKET_ID),
                ColumnSpec::text("B", "Fecha de creación", keys::CREATED_AT),
                ColumnSpec::text("C", "Aplicación", keys::APPLICATION),
                ColumnSpec::text("D", "Resumen", keys::SUMMARY),
                ColumnSpec::text("E", "Prioridad", keys::PRIORITY),
                ColumnSpec::text("F", "Estado", keys::STATUS),
                ColumnSpec::text("G", "Información adicional", keys::ADDITIONAL_INFO),
                ColumnSpec::link("H", "Ticket vinculado", keys::LINKED_REQUEST),
            ],
            marker_keywords: Vec::new(),
        }
    }

    /// 父子工单关联表
    pub fn link_pairs() -> Self {
        Self {
            kind: SheetKind::LinkPairs,
            sheet_name: DEFAULT_LINK_SHEET.to_string(),
            columns: vec![
                ColumnSpec::link("A", "Ticket padre", keys::PARENT_ID),
                ColumnSpec::text("B", "Ticket hijo", keys::CHILD_ID),
            ],
            marker_keywords: Vec::new(),
        }
    }

    /// 标签表（穿插分类标记行）
    pub fn tags() -> Self {
        Self {
            kind: SheetKind::Tags,
            sheet_name: DEFAULT_TAG_SHEET.to_string(),
            columns: vec![
                ColumnSpec::link("A", "Ticket", keys::REQUEST_ID),
                ColumnSpec::text("B", "Ticket vinculado", keys::LINKED_REQUEST),
                ColumnSpec::text("C", "Información adicional", keys::ADDITIONAL_INFO),
            ],
            marker_keywords: MARKER_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn for_kind(kind: SheetKind) -> Self {
        match kind {
            SheetKind::Incidents => Self::incidents(),
            SheetKind::LinkPairs => Self::link_pairs(),
            SheetKind::Tags => Self::tags(),
        }
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    pub fn uses_markers(&self) -> bool {
        !self.marker_keywords.is_empty()
    }

    /// 列字母 → 下标
    pub fn resolve(&self) -> ImportResult<Vec<ResolvedColumn>> {
        self.columns
            .iter()
            .map(|spec| {
                Ok(ResolvedColumn {
                    index: column_index(&spec.letter)?,
                    spec: spec.clone(),
                })
            })
            .collect()
    }
}

/// 列字母转零基下标: A → 0, Z → 25, AA → 26
pub fn column_index(letter: &str) -> ImportResult<usize> {
    let letter = letter.trim();
    if letter.is_empty() {
        return Err(ImportError::InvalidColumnLetter(letter.to_string()));
    }

    let mut index: usize = 0;
    for ch in letter.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(ImportError::InvalidColumnLetter(letter.to_string()));
        }
        let value = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(value))
            .ok_or_else(|| ImportError::InvalidColumnLetter(letter.to_string()))?;
    }
    Ok(index - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("h").unwrap(), 7);
        assert_eq!(column_index("Z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_index("AZ").unwrap(), 51);
        assert_eq!(column_index("BA").unwrap(), 52);
        assert!(column_index("").is_err());
        assert!(column_index("A1").is_err());
    }

    #[test]
    fn test_incident_layout_resolves() {
        let layout = SheetLayout::incidents();
        let resolved = layout.resolve().unwrap();
        assert_eq!(resolved.len(), 8);
        assert_eq!(resolved[7].index, 7);
        assert!(resolved[0].spec.link);
        assert!(!layout.uses_markers());
    }

    #[test]
    fn test_tag_layout_uses_markers() {
        let layout = SheetLayout::for_kind(SheetKind::Tags).with_sheet_name("Tags");
        assert!(layout.uses_markers());
        assert_eq!(layout.sheet_name, "Tags");
    }
}
