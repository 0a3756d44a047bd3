// ==========================================
// 运维事件报表导入系统 - 分类规则领域模型
// ==========================================
// 职责: 分类规则与规则集定义
// 红线: 规则引擎只读规则；增删改由外部规则管理面负责
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// PatternType - 匹配方式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Exact,    // 归一化后全等
    Contains, // 归一化后子串
    Regex,    // 大小写不敏感正则（作用于原始文本）
}

impl PatternType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "exact" => Some(PatternType::Exact),
            "contains" => Some(PatternType::Contains),
            "regex" => Some(PatternType::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Exact => write!(f, "exact"),
            PatternType::Contains => write!(f, "contains"),
            PatternType::Regex => write!(f, "regex"),
        }
    }
}

// ==========================================
// RulePurpose - 规则集用途
// ==========================================
// 不同用途的规则集互不影响
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePurpose {
    BusinessUnit,  // 业务单元识别
    StatusMapping, // 状态映射
}

impl RulePurpose {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "BUSINESS_UNIT" => Some(RulePurpose::BusinessUnit),
            "STATUS_MAPPING" => Some(RulePurpose::StatusMapping),
            _ => None,
        }
    }
}

impl fmt::Display for RulePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePurpose::BusinessUnit => write!(f, "BUSINESS_UNIT"),
            RulePurpose::StatusMapping => write!(f, "STATUS_MAPPING"),
        }
    }
}

// ==========================================
// ClassificationRule - 分类规则
// ==========================================
// 生效顺序: priority 升序，相同 priority 按插入/展示顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    pub pattern_type: PatternType,
    pub priority: i32,
    pub target: String,
    pub active: bool,
}

impl ClassificationRule {
    pub fn new(
        pattern: impl Into<String>,
        pattern_type: PatternType,
        priority: i32,
        target: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            pattern_type,
            priority,
            target: target.into(),
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

// ==========================================
// RuleSet - 同一用途的有序规则快照
// ==========================================
// 每次导入加载一份新快照，导入期间不变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub purpose: RulePurpose,
    pub rules: Vec<ClassificationRule>,
}

impl RuleSet {
    pub fn new(purpose: RulePurpose, rules: Vec<ClassificationRule>) -> Self {
        Self { purpose, rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 默认业务单元规则（规则库为空时使用）
    pub fn default_business_units() -> Self {
        Self::new(
            RulePurpose::BusinessUnit,
            vec![
                ClassificationRule::new("somos belcorp", PatternType::Contains, 10, "SB"),
                ClassificationRule::new("app consultora", PatternType::Contains, 20, "APC"),
                ClassificationRule::new("mi negocio", PatternType::Contains, 20, "MN"),
                ClassificationRule::new(r"^\s*(esika|l'?bel|cyzone)\b", PatternType::Regex, 30, "MARCAS"),
                ClassificationRule::new("ecommerce", PatternType::Contains, 40, "ECOM"),
            ],
        )
    }

    /// 默认状态映射规则（规则库为空时使用）
    pub fn default_status_mappings() -> Self {
        Self::new(
            RulePurpose::StatusMapping,
            vec![
                ClassificationRule::new("nivel 1", PatternType::Exact, 10, "On going in L1"),
                ClassificationRule::new("nivel 2", PatternType::Exact, 10, "On going in L2"),
                ClassificationRule::new("nivel 3", PatternType::Exact, 10, "On going in L3"),
                ClassificationRule::new("pendiente de fix", PatternType::Contains, 20, "Backlog"),
                ClassificationRule::new("en espera de cliente", PatternType::Exact, 20, "Awaiting client"),
                ClassificationRule::new(r"^(resuelto|cerrado)", PatternType::Regex, 30, "Resolved"),
            ],
        )
    }
}
