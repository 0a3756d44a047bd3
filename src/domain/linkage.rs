// ==========================================
// 运维事件报表导入系统 - 关联领域模型
// ==========================================
// 职责: 父子工单对 / 标签行 / 分组视图
// 来源: 兄弟导入管道（共用 CellNormalizer 与 RowExtractor）
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ParentChildPair - 父子工单对
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChildPair {
    pub parent_id: String,
    pub parent_link: Option<String>,
    pub child_id: String,
}

// ==========================================
// TagRow - 标签行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub request_id: String,
    pub request_link: Option<String>,
    pub linked_request_id: String,
    pub categorization: String,  // 来自分类标记行
    pub additional_info: String,
}

// ==========================================
// RequestRef - 带可选链接的工单引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRef {
    pub id: String,
    pub link: Option<String>,
}

// ==========================================
// LinkGroup - 按子工单分组的父工单
// ==========================================
// 用于外部展开/下钻展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGroup {
    pub child_id: String,
    pub parent_count: usize,
    pub parents: Vec<RequestRef>,
}

// ==========================================
// TagGroup - 按关联工单分组的标签
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub linked_request_id: String,
    pub categorizations: Vec<String>, // 去重，插入顺序
    pub additional_infos: Vec<String>, // 去重，插入顺序
}

// ==========================================
// LabelRequests - 标签 → 工单反查
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRequests {
    pub label: String,
    pub requests: Vec<RequestRef>, // 按 id 去重，插入顺序
}

// ==========================================
// TagGroups - 标签分组视图
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroups {
    pub groups: Vec<TagGroup>,
    pub by_categorization: Vec<LabelRequests>,
    pub by_additional_info: Vec<LabelRequests>,
}

impl TagGroups {
    pub fn group(&self, linked_request_id: &str) -> Option<&TagGroup> {
        self.groups
            .iter()
            .find(|g| g.linked_request_id == linked_request_id)
    }

    pub fn requests_for_categorization(&self, label: &str) -> Option<&[RequestRef]> {
        self.by_categorization
            .iter()
            .find(|l| l.label == label)
            .map(|l| l.requests.as_slice())
    }

    pub fn requests_for_additional_info(&self, label: &str) -> Option<&[RequestRef]> {
        self.by_additional_info
            .iter()
            .find(|l| l.label == label)
            .map(|l| l.requests.as_slice())
    }
}
