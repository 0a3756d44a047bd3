// ==========================================
// 运维事件报表导入系统 - 字段映射器
// ==========================================
// 职责: SourceRow → 各工作表的显式类型化行
// ==========================================

use crate::domain::incident::{IncidentRow, RowError, SourceRow};
use crate::domain::linkage::{ParentChildPair, TagRow};
use crate::importer::sheet_layout::keys;

pub struct FieldMapper;

impl FieldMapper {
    /// 事件行（必填校验留给 RecordDeriver）
    pub fn to_incident(&self, row: &SourceRow) -> IncidentRow {
        IncidentRow {
            row_number: row.row_number,
            ticket_id: row.text(keys::TICKET_ID).to_string(),
            ticket_url: row.link(keys::TICKET_ID).map(str::to_string),
            created_at_raw: row.text(keys::CREATED_AT).to_string(),
            application: row.text(keys::APPLICATION).to_string(),
            summary: row.text(keys::SUMMARY).to_string(),
            priority_raw: row.text(keys::PRIORITY).to_string(),
            status_raw: row.text(keys::STATUS).to_string(),
            additional_info: row.text(keys::ADDITIONAL_INFO).to_string(),
            linked_request_id: non_empty(row.text(keys::LINKED_REQUEST)),
            linked_request_url: row.link(keys::LINKED_REQUEST).map(str::to_string),
            category: row.category.clone(),
            linked_count: None,
        }
    }

    /// 父子工单对（父/子任一为空 → 行级错误）
    pub fn to_link_pair(&self, row: &SourceRow) -> Result<ParentChildPair, RowError> {
        let parent_id = required(row, keys::PARENT_ID)?;
        let child_id = required(row, keys::CHILD_ID)?;
        Ok(ParentChildPair {
            parent_id,
            parent_link: row.link(keys::PARENT_ID).map(str::to_string),
            child_id,
        })
    }

    /// 标签行（类别来自前置分类标记行）
    pub fn to_tag(&self, row: &SourceRow) -> Result<TagRow, RowError> {
        let request_id = required(row, keys::REQUEST_ID)?;
        let linked_request_id = required(row, keys::LINKED_REQUEST)?;
        Ok(TagRow {
            request_id,
            request_link: row.link(keys::REQUEST_ID).map(str::to_string),
            linked_request_id,
            categorization: row.category.clone().unwrap_or_default(),
            additional_info: row.text(keys::ADDITIONAL_INFO).to_string(),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn required(row: &SourceRow, key: &str) -> Result<String, RowError> {
    non_empty(row.text(key)).ok_or_else(|| RowError {
        row: row.row_number,
        field: key.to_string(),
        message: format!("必填字段为空: {}", key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cell::NormalizedCell;
    use crate::domain::incident::SourceField;

    fn field(key: &str, cell: NormalizedCell) -> SourceField {
        SourceField {
            key: key.to_string(),
            header: key.to_string(),
            cell,
        }
    }

    #[test]
    fn test_to_incident_trims_and_keeps_links() {
        let row = SourceRow {
            row_number: 5,
            fields: vec![
                field(keys::TICKET_ID, NormalizedCell::linked(" REQ-1 ", "https://jira.example/REQ-1")),
                field(keys::APPLICATION, NormalizedCell::plain("  Mi Negocio ")),
                field(keys::LINKED_REQUEST, NormalizedCell::plain("   ")),
            ],
            category: None,
        };
        let incident = FieldMapper.to_incident(&row);

        assert_eq!(incident.row_number, 5);
        assert_eq!(incident.ticket_id, "REQ-1");
        assert_eq!(incident.ticket_url.as_deref(), Some("https://jira.example/REQ-1"));
        assert_eq!(incident.application, "Mi Negocio");
        assert_eq!(incident.linked_request_id, None);
        // 缺失列视为空串
        assert_eq!(incident.status_raw, "");
    }

    #[test]
    fn test_to_link_pair_requires_both_ids() {
        let row = SourceRow {
            row_number: 3,
            fields: vec![
                field(keys::PARENT_ID, NormalizedCell::linked("P1", "https://x/P1")),
                field(keys::CHILD_ID, NormalizedCell::plain("")),
            ],
            category: None,
        };
        let err = FieldMapper.to_link_pair(&row).unwrap_err();
        assert_eq!(err.row, 3);
        assert_eq!(err.field, keys::CHILD_ID);
    }

    #[test]
    fn test_to_tag_takes_category() {
        let row = SourceRow {
            row_number: 4,
            fields: vec![
                field(keys::REQUEST_ID, NormalizedCell::plain("R1")),
                field(keys::LINKED_REQUEST, NormalizedCell::plain("L1")),
                field(keys::ADDITIONAL_INFO, NormalizedCell::plain("Pagos")),
            ],
            category: Some("Bug errors".to_string()),
        };
        let tag = FieldMapper.to_tag(&row).unwrap();
        assert_eq!(tag.categorization, "Bug errors");
        assert_eq!(tag.additional_info, "Pagos");
    }
}
