// ==========================================
// 运维事件报表导入系统 - 事件导入 Trait
// ==========================================
// 职责: 定义事件导入接口与外部协作方接缝（不包含实现）
// 红线: 规则来源只提供只读快照；管道从不修改规则
// ==========================================

use crate::domain::incident::ImportEnvelope;
use crate::domain::rule::{RulePurpose, RuleSet};
use crate::engine::rule_engine::CompiledRuleSet;
use crate::importer::error::ImportResult;
use crate::importer::workbook::Workbook;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// IncidentImporter Trait
// ==========================================
// 用途: 事件导入主接口
// 实现者: IncidentImporterImpl
#[async_trait]
pub trait IncidentImporter: Send + Sync {
    /// 从内存中的工作簿导入事件报表
    ///
    /// # 返回
    /// - Ok(ImportEnvelope): 结果信封（部分成功同样返回 Ok）
    /// - Err: 结构性错误（工作表缺失、表头列数不足等），整文件中止
    ///
    /// # 导入流程
    /// 1. 配置快照 + 规则快照
    /// 2. 截止窗口校验（失败则回退当前自然周并告警）
    /// 3. 行抽取（表头校验、分类标记、空行跳过）
    /// 4. 字段映射
    /// 5. 业务单元分类（逐行等待，保持行序）
    /// 6. 记录派生
    /// 7. 关联计数回填（关联工作表存在时）
    async fn import_workbook(&self, workbook: &Workbook) -> ImportResult<ImportEnvelope>;

    /// 从文件导入（.xlsx / .xlsm / .csv）
    ///
    /// # 参数
    /// - file_path: 文件路径，扩展名决定解析方式
    async fn import_file<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportEnvelope>;
}

// ==========================================
// RuleSetSource Trait
// ==========================================
// 用途: 每次导入加载一份有序规则快照
// 实现者: ClassificationRuleRepository, DefaultRuleSource
#[async_trait]
pub trait RuleSetSource: Send + Sync {
    /// 按用途加载规则（priority 升序、展示顺序次之）
    ///
    /// # 返回
    /// - 空规则集: 调用方回退到内置默认规则
    async fn load_rule_set(&self, purpose: RulePurpose) -> ImportResult<RuleSet>;
}

/// 内置默认规则来源
pub struct DefaultRuleSource;

#[async_trait]
impl RuleSetSource for DefaultRuleSource {
    async fn load_rule_set(&self, purpose: RulePurpose) -> ImportResult<RuleSet> {
        Ok(match purpose {
            RulePurpose::BusinessUnit => RuleSet::default_business_units(),
            RulePurpose::StatusMapping => RuleSet::default_status_mappings(),
        })
    }
}

// ==========================================
// BusinessUnitClassifier Trait
// ==========================================
// 用途: 外部提供的业务单元分类器（可能异步，如远程服务）
// 规则: 导入器逐行 await，派生结果保持行序
#[async_trait]
pub trait BusinessUnitClassifier: Send + Sync {
    /// 应用名称 → 业务单元码
    ///
    /// # 返回
    /// - Ok(code): 未识别时返回 unknown_code
    /// - Err(ClassifierError): 外部分类器失败，计入该行错误
    async fn classify(&self, application: &str, unknown_code: &str) -> ImportResult<String>;
}

/// 基于固定规则集的分类器
pub struct RuleBasedClassifier {
    rules: CompiledRuleSet,
}

impl RuleBasedClassifier {
    pub fn new(rule_set: &RuleSet) -> Self {
        Self {
            rules: CompiledRuleSet::from_rule_set(rule_set),
        }
    }
}

#[async_trait]
impl BusinessUnitClassifier for RuleBasedClassifier {
    async fn classify(&self, application: &str, unknown_code: &str) -> ImportResult<String> {
        Ok(self.rules.classify_or(application, unknown_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_rule_source_returns_seeds() {
        let rules = DefaultRuleSource
            .load_rule_set(RulePurpose::StatusMapping)
            .await
            .unwrap();
        assert_eq!(rules.purpose, RulePurpose::StatusMapping);
        assert!(!rules.is_empty());
    }

    #[tokio::test]
    async fn test_rule_based_classifier() {
        let classifier = RuleBasedClassifier::new(&RuleSet::default_business_units());
        assert_eq!(
            classifier.classify("Somos Belcorp 2.0", "UNKNOWN").await.unwrap(),
            "SB"
        );
        assert_eq!(
            classifier.classify("Portal interno", "UNKNOWN").await.unwrap(),
            "UNKNOWN"
        );
    }
}
