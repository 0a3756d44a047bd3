// ==========================================
// 运维事件报表导入系统 - 规则分类引擎
// ==========================================
// 规则: priority 升序求值，首个命中的启用规则胜出
// 红线: 默认值由调用方显式传入，引擎不硬编码
// 红线: 单条正则编译失败只禁用该规则并告警，不中断求值
// ==========================================

use crate::domain::rule::{ClassificationRule, PatternType, RuleSet};
use crate::engine::text_norm::fold_for_match;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

// ==========================================
// RuleWarning - 规则配置告警
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleWarning {
    pub pattern: String,
    pub target: String,
    pub message: String,
}

impl fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "规则已禁用 (pattern={}, target={}): {}",
            self.pattern, self.target, self.message
        )
    }
}

// ==========================================
// Classification - 单次分类结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub value: String,
    pub matched: bool,
    pub warnings: Vec<RuleWarning>,
}

enum Matcher {
    Exact(String),
    Contains(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, normalized: &str, original: &str) -> bool {
        match self {
            Matcher::Exact(p) => normalized == p,
            Matcher::Contains(p) => normalized.contains(p.as_str()),
            // 正则作用于原始（未去空白）文本
            Matcher::Regex(re) => re.is_match(original),
        }
    }
}

struct CompiledRule {
    rule: ClassificationRule,
    matcher: Matcher,
}

// ==========================================
// CompiledRuleSet - 预排序、预编译的规则快照
// ==========================================
// 每次导入编译一次，逐行复用
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
    warnings: Vec<RuleWarning>,
}

impl CompiledRuleSet {
    /// 编译规则列表
    ///
    /// # 规则
    /// - 仅启用规则参与
    /// - 稳定排序: priority 升序，同 priority 保持传入顺序
    /// - 非法正则 / 空模式 → 该规则不参与匹配，记录告警
    pub fn compile(rules: &[ClassificationRule]) -> Self {
        let mut ordered: Vec<&ClassificationRule> = rules.iter().filter(|r| r.active).collect();
        ordered.sort_by_key(|r| r.priority);

        let mut compiled = Vec::with_capacity(ordered.len());
        let mut warnings = Vec::new();

        for rule in ordered {
            match build_matcher(&rule.pattern, rule.pattern_type) {
                Ok(matcher) => compiled.push(CompiledRule {
                    rule: rule.clone(),
                    matcher,
                }),
                Err(message) => {
                    warn!(
                        pattern = %rule.pattern,
                        target = %rule.target,
                        error = %message,
                        "分类规则无效，本次求值中禁用"
                    );
                    warnings.push(RuleWarning {
                        pattern: rule.pattern.clone(),
                        target: rule.target.clone(),
                        message,
                    });
                }
            }
        }

        Self {
            rules: compiled,
            warnings,
        }
    }

    pub fn from_rule_set(rule_set: &RuleSet) -> Self {
        Self::compile(&rule_set.rules)
    }

    /// 编译期告警（无效规则）
    pub fn warnings(&self) -> &[RuleWarning] {
        &self.warnings
    }

    /// 参与匹配的规则数
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 返回首个命中的规则
    pub fn first_match(&self, text: &str) -> Option<&ClassificationRule> {
        let normalized = fold_for_match(text);
        self.rules
            .iter()
            .find(|r| r.matcher.is_match(&normalized, text))
            .map(|r| &r.rule)
    }

    /// 分类: 命中返回 target，否则返回调用方给定的默认值
    pub fn classify_or(&self, text: &str, default: &str) -> String {
        self.first_match(text)
            .map(|r| r.target.clone())
            .unwrap_or_else(|| default.to_string())
    }
}

fn build_matcher(pattern: &str, pattern_type: PatternType) -> Result<Matcher, String> {
    match pattern_type {
        PatternType::Exact | PatternType::Contains => {
            let normalized = fold_for_match(pattern);
            if normalized.is_empty() {
                return Err("模式为空".to_string());
            }
            Ok(if pattern_type == PatternType::Exact {
                Matcher::Exact(normalized)
            } else {
                Matcher::Contains(normalized)
            })
        }
        PatternType::Regex => RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Matcher::Regex)
            .map_err(|e| format!("正则编译失败: {}", e)),
    }
}

// ==========================================
// RuleEngine - 规则分类引擎
// ==========================================
pub struct RuleEngine;

impl RuleEngine {
    /// 对单个文本执行分类（一次性编译）
    ///
    /// # 参数
    /// - rule_set: 规则快照
    /// - text: 待分类文本
    /// - default: 未命中时的返回值（业务单元用 "UNKNOWN"，状态映射用原文）
    pub fn classify(&self, rule_set: &RuleSet, text: &str, default: &str) -> Classification {
        let compiled = CompiledRuleSet::from_rule_set(rule_set);
        let matched = compiled.first_match(text).map(|r| r.target.clone());
        Classification {
            matched: matched.is_some(),
            value: matched.unwrap_or_else(|| default.to_string()),
            warnings: compiled.warnings,
        }
    }

    /// 单条模式试匹配（供规则编写/校验工具使用）
    ///
    /// 非法正则返回 false
    pub fn test_pattern(&self, pattern: &str, text: &str, pattern_type: PatternType) -> bool {
        match build_matcher(pattern, pattern_type) {
            Ok(matcher) => matcher.is_match(&fold_for_match(text), text),
            Err(_) => false,
        }
    }

    /// 校验模式是否可用（供规则编写/校验工具使用）
    pub fn validate_pattern(&self, pattern: &str, pattern_type: PatternType) -> Result<(), String> {
        build_matcher(pattern, pattern_type).map(|_| ())
    }
}
