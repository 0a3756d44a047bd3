// ==========================================
// 运维事件报表导入系统 - 表头宽松匹配
// ==========================================
// 职责: 纯评分函数（归一化 → 分词 → 比较），与抽取流程分离
// 规则: 不匹配只产生诊断信息，由调用方记为警告
// ==========================================

use crate::engine::text_norm::{fold_for_match, tokenize};
use serde::{Deserialize, Serialize};

/// 判定为匹配的最低得分
pub const HEADER_MATCH_THRESHOLD: f64 = 0.5;

/// 单列表头比较输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProbe {
    pub letter: String,
    pub expected: String,
    pub actual: String,
}

// ==========================================
// HeaderMatchReport - 表头校验报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderMatchReport {
    pub matched: bool,
    pub score: f64,               // 各列得分均值
    pub diagnostics: Vec<String>, // 每个不匹配列一条
}

pub struct HeaderMatcher;

impl HeaderMatcher {
    /// 单列得分
    ///
    /// # 规则
    /// - 归一化（大小写/空白/重音）后相等 → 1.0
    /// - 一方包含另一方 → 0.9
    /// - 否则 → 期望词元在实际词元中的覆盖率
    pub fn score(&self, expected: &str, actual: &str) -> f64 {
        let e = fold_for_match(expected);
        let a = fold_for_match(actual);
        if e == a {
            return 1.0;
        }
        if e.is_empty() || a.is_empty() {
            return 0.0;
        }
        if a.contains(&e) || e.contains(&a) {
            return 0.9;
        }

        let expected_tokens = tokenize(expected);
        if expected_tokens.is_empty() {
            return 0.0;
        }
        let actual_tokens = tokenize(actual);
        let overlap = expected_tokens
            .iter()
            .filter(|t| actual_tokens.contains(t))
            .count();
        overlap as f64 / expected_tokens.len() as f64
    }

    pub fn is_match(&self, expected: &str, actual: &str) -> bool {
        self.score(expected, actual) >= HEADER_MATCH_THRESHOLD
    }

    /// 整行表头校验
    pub fn validate(&self, probes: &[HeaderProbe]) -> HeaderMatchReport {
        if probes.is_empty() {
            return HeaderMatchReport {
                matched: true,
                score: 1.0,
                diagnostics: Vec::new(),
            };
        }

        let mut total = 0.0;
        let mut diagnostics = Vec::new();
        for probe in probes {
            let score = self.score(&probe.expected, &probe.actual);
            total += score;
            if score < HEADER_MATCH_THRESHOLD {
                diagnostics.push(format!(
                    "列 {} 表头不匹配: 期望 \"{}\"，实际 \"{}\" (得分 {:.2})",
                    probe.letter, probe.expected, probe.actual, score
                ));
            }
        }

        HeaderMatchReport {
            matched: diagnostics.is_empty(),
            score: total / probes.len() as f64,
            diagnostics,
        }
    }
}
