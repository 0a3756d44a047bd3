// ==========================================
// 运维事件报表导入系统 - 关联聚合器
// ==========================================
// 职责: 关联工单计数 + 父子分组视图 + 标签分组视图
// 规则: 集合去重，对外列表保持插入顺序
// ==========================================

use crate::domain::incident::DerivedRecord;
use crate::domain::linkage::{
    LabelRequests, LinkGroup, ParentChildPair, RequestRef, TagGroup, TagGroups, TagRow,
};
use crate::engine::record_deriver::summary_message;
use std::collections::HashMap;

pub struct LinkageAggregator;

impl LinkageAggregator {
    /// 回填每条记录的关联工单数并重算摘要
    ///
    /// # 规则
    /// - count = child_id 等于记录关联工单号的父子对数量
    /// - 无关联工单号的记录保留派生时的计数
    pub fn aggregate(&self, records: &mut [DerivedRecord], pairs: &[ParentChildPair]) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for pair in pairs {
            *counts.entry(pair.child_id.trim()).or_insert(0) += 1;
        }

        for record in records.iter_mut() {
            let Some(linked_id) = record
                .linked_request_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            record.linked_count = counts.get(linked_id).copied().unwrap_or(0);
            record.message = summary_message(Some(linked_id), record.linked_count);
        }
    }

    /// 按子工单分组父工单（父工单不去重，保留全部引用）
    pub fn group_by_child(&self, pairs: &[ParentChildPair]) -> Vec<LinkGroup> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<LinkGroup> = Vec::new();

        for pair in pairs {
            let child_id = pair.child_id.trim();
            let slot = *index.entry(child_id).or_insert_with(|| {
                groups.push(LinkGroup {
                    child_id: child_id.to_string(),
                    parent_count: 0,
                    parents: Vec::new(),
                });
                groups.len() - 1
            });

            let group = &mut groups[slot];
            group.parents.push(RequestRef {
                id: pair.parent_id.clone(),
                link: pair.parent_link.clone(),
            });
            group.parent_count = group.parents.len();
        }

        groups
    }

    /// 按关联工单分组标签，并建立标签 → 工单反查
    pub fn group_tags(&self, tags: &[TagRow]) -> TagGroups {
        let mut groups = OrderedIndex::<TagGroup>::default();
        let mut by_categorization = OrderedIndex::<LabelRequests>::default();
        let mut by_additional_info = OrderedIndex::<LabelRequests>::default();

        for tag in tags {
            let request = RequestRef {
                id: tag.request_id.clone(),
                link: tag.request_link.clone(),
            };

            let group = groups.get_or_insert(&tag.linked_request_id, |key| TagGroup {
                linked_request_id: key.to_string(),
                categorizations: Vec::new(),
                additional_infos: Vec::new(),
            });
            push_distinct(&mut group.categorizations, &tag.categorization);
            push_distinct(&mut group.additional_infos, &tag.additional_info);

            if !tag.categorization.trim().is_empty() {
                let entry = by_categorization.get_or_insert(&tag.categorization, label_requests);
                push_distinct_request(&mut entry.requests, &request);
            }
            if !tag.additional_info.trim().is_empty() {
                let entry = by_additional_info.get_or_insert(&tag.additional_info, label_requests);
                push_distinct_request(&mut entry.requests, &request);
            }
        }

        TagGroups {
            groups: groups.into_vec(),
            by_categorization: by_categorization.into_vec(),
            by_additional_info: by_additional_info.into_vec(),
        }
    }
}

fn label_requests(label: &str) -> LabelRequests {
    LabelRequests {
        label: label.to_string(),
        requests: Vec::new(),
    }
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

fn push_distinct_request(requests: &mut Vec<RequestRef>, request: &RequestRef) {
    if !requests.iter().any(|r| r.id == request.id) {
        requests.push(request.clone());
    }
}

// 插入有序的 key → 条目索引
struct OrderedIndex<T> {
    index: HashMap<String, usize>,
    items: Vec<T>,
}

impl<T> Default for OrderedIndex<T> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<T> OrderedIndex<T> {
    fn get_or_insert(&mut self, key: &str, make: impl FnOnce(&str) -> T) -> &mut T {
        let key = key.trim();
        let slot = match self.index.get(key) {
            Some(&slot) => slot,
            None => {
                self.items.push(make(key));
                self.index.insert(key.to_string(), self.items.len() - 1);
                self.items.len() - 1
            }
        };
        &mut self.items[slot]
    }

    fn into_vec(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn pair(parent: &str, child: &str) -> ParentChildPair {
        ParentChildPair {
            parent_id: parent.to_string(),
            parent_link: Some(format!("https://jira.example/{}", parent)),
            child_id: child.to_string(),
        }
    }

    fn tag(request: &str, linked: &str, categorization: &str, info: &str) -> TagRow {
        TagRow {
            request_id: request.to_string(),
            request_link: None,
            linked_request_id: linked.to_string(),
            categorization: categorization.to_string(),
            additional_info: info.to_string(),
        }
    }

    fn record(ticket: &str, linked: Option<&str>) -> DerivedRecord {
        DerivedRecord {
            row_number: 2,
            ticket_id: ticket.to_string(),
            ticket_url: None,
            application: "Somos Belcorp".to_string(),
            summary: String::new(),
            category: None,
            status_raw: "Nivel 1".to_string(),
            priority_raw: "Alta".to_string(),
            business_unit: "SB".to_string(),
            status: "On going in L1".to_string(),
            priority: "High".to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 9, 19)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            in_window: true,
            day_of_month: 19,
            week_number: 38,
            additional_info: String::new(),
            linked_request_id: linked.map(str::to_string),
            linked_request_url: None,
            linked_count: 0,
            message: String::new(),
            status_overridden: false,
        }
    }

    #[test]
    fn test_aggregate_counts_and_messages() {
        let pairs = vec![pair("P1", "REQ-9"), pair("P2", "REQ-9"), pair("P3", "REQ-7")];
        let mut records = vec![
            record("T1", Some("REQ-9")),
            record("T2", Some("REQ-8")),
            record("T3", None),
        ];

        LinkageAggregator.aggregate(&mut records, &pairs);

        assert_eq!(records[0].linked_count, 2);
        assert_eq!(records[0].message, "REQ-9 --> 2 Linked tickets");
        assert_eq!(records[1].linked_count, 0);
        assert_eq!(records[1].message, "REQ-8 --> 0 Linked tickets");
        assert_eq!(records[2].message, "");
    }

    #[test]
    fn test_group_by_child_preserves_order() {
        let pairs = vec![pair("P1", "C2"), pair("P2", "C1"), pair("P3", "C2"), pair("P1", "C2")];
        let groups = LinkageAggregator.group_by_child(&pairs);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].child_id, "C2");
        assert_eq!(groups[0].parent_count, 3);
        assert_eq!(
            groups[0].parents.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["P1", "P3", "P1"]
        );
        assert_eq!(groups[1].child_id, "C1");
        assert_eq!(groups[1].parents[0].link.as_deref(), Some("https://jira.example/P2"));
    }

    #[test]
    fn test_group_tags_deduplicates() {
        let tags = vec![
            tag("R1", "L1", "Bug errors", "Pagos"),
            tag("R2", "L1", "Bug errors", "Pedidos"),
            tag("R3", "L1", "Informational", "Pagos"),
            tag("R1", "L2", "Bug errors", ""),
        ];
        let view = LinkageAggregator.group_tags(&tags);

        let l1 = view.group("L1").unwrap();
        assert_eq!(l1.categorizations, vec!["Bug errors", "Informational"]);
        assert_eq!(l1.additional_infos, vec!["Pagos", "Pedidos"]);
        assert!(view.group("L2").unwrap().additional_infos.is_empty());

        let bugs = view.requests_for_categorization("Bug errors").unwrap();
        assert_eq!(bugs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["R1", "R2"]);

        let pagos = view.requests_for_additional_info("Pagos").unwrap();
        assert_eq!(pagos.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["R1", "R3"]);
        assert!(view.requests_for_additional_info("").is_none());
    }
}
