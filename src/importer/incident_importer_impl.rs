// ==========================================
// 运维事件报表导入系统 - 事件导入器实现
// ==========================================
// 职责: 整合导入流程，从工作簿到结果信封
// 流程: 配置快照 → 规则快照 → 窗口策略 → 行抽取 → 映射 → 分类 → 派生 → 关联回填
// 红线: 本管道不落库；信封交给持久化协作方
// ==========================================

use crate::config::{PipelineConfig, PipelineConfigReader};
use crate::domain::incident::{ImportEnvelope, ImportSummary, IncidentRow, RowError};
use crate::domain::rule::{RulePurpose, RuleSet};
use crate::domain::types::WorkbookFormat;
use crate::engine::cut_calendar::{CutCalendar, WindowPolicy};
use crate::engine::linkage_aggregator::LinkageAggregator;
use crate::engine::record_deriver::RecordDeriver;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::incident_importer_trait::{
    BusinessUnitClassifier, IncidentImporter, RuleSetSource,
};
use crate::importer::linkage_importer::LinkageImporter;
use crate::importer::row_extractor::RowExtractor;
use crate::importer::sheet_layout::SheetLayout;
use crate::importer::workbook::Workbook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// IncidentImporterImpl - 事件导入器实现
// ==========================================
pub struct IncidentImporterImpl<C, S>
where
    C: PipelineConfigReader,
    S: RuleSetSource,
{
    // 配置读取器
    config: C,

    // 规则来源
    rule_source: S,

    // 外部业务单元分类器（None → 使用规则快照）
    classifier: Option<Arc<dyn BusinessUnitClassifier>>,

    // 固定时钟（None → 系统时间）
    clock: Option<DateTime<Utc>>,
}

impl<C, S> IncidentImporterImpl<C, S>
where
    C: PipelineConfigReader,
    S: RuleSetSource,
{
    /// 创建新的 IncidentImporter 实例
    ///
    /// # 参数
    /// - config: 配置读取器
    /// - rule_source: 规则来源（每次导入加载一份快照）
    pub fn new(config: C, rule_source: S) -> Self {
        Self {
            config,
            rule_source,
            classifier: None,
            clock: None,
        }
    }

    /// 替换业务单元分类器
    pub fn with_classifier(mut self, classifier: Arc<dyn BusinessUnitClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 固定"当前时间"（回退窗口按此计算）
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    async fn load_config(&self) -> ImportResult<PipelineConfig> {
        self.config
            .snapshot()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "pipeline".to_string(),
                message: e.to_string(),
            })
    }

    /// 加载规则快照（规则库为空时回退内置默认规则）
    async fn load_rules(&self, purpose: RulePurpose) -> ImportResult<RuleSet> {
        let rule_set = self.rule_source.load_rule_set(purpose).await?;
        if rule_set.is_empty() {
            info!(purpose = %purpose, "规则库为空，使用内置默认规则");
            return Ok(match purpose {
                RulePurpose::BusinessUnit => RuleSet::default_business_units(),
                RulePurpose::StatusMapping => RuleSet::default_status_mappings(),
            });
        }
        debug!(purpose = %purpose, rules = rule_set.rules.len(), "规则快照已加载");
        Ok(rule_set)
    }

    /// 确定窗口归属策略
    ///
    /// # 规则
    /// - 已配置且校验通过 → 显式窗口
    /// - 未配置 / 无法解析 / 校验失败 → 当前自然周回退，并给出分歧告警
    fn resolve_window(
        &self,
        config: &PipelineConfig,
        calendar: &CutCalendar,
        warnings: &mut Vec<String>,
    ) -> WindowPolicy {
        match &config.cut_window {
            Ok(Some(window)) => match calendar.validate(window) {
                Ok(()) => {
                    info!(window = %window, "使用已配置截止窗口");
                    return WindowPolicy::Explicit(*window);
                }
                Err(e) => {
                    let message = format!("已配置截止窗口 {} 校验失败: {}", window, e);
                    warn!("{}", message);
                    warnings.push(message);
                }
            },
            Ok(None) => {}
            Err(e) => {
                let message = format!("已存储截止窗口无法解析: {}", e);
                warn!("{}", message);
                warnings.push(message);
            }
        }

        let policy = WindowPolicy::CurrentWeek {
            now: self.now().with_timezone(&calendar.timezone()),
        };
        if let Some(message) = policy.divergence_warning(calendar) {
            warn!("{}", message);
            warnings.push(message);
        }
        policy
    }

    /// 单行业务单元分类
    async fn classify(&self, deriver: &RecordDeriver, row: &IncidentRow) -> ImportResult<String> {
        let Some(classifier) = &self.classifier else {
            return Ok(deriver.classify_business_unit(&row.application));
        };

        classifier
            .classify(&row.application, &deriver.policy().unknown_business_unit)
            .await
            .map_err(|e| match e {
                ImportError::ClassifierError { .. } => e,
                other => ImportError::ClassifierError {
                    row: row.row_number,
                    message: other.to_string(),
                },
            })
    }

    /// 关联工作表存在时回填关联计数
    ///
    /// 关联表缺失或结构错误不影响事件导入
    fn apply_linkage(
        &self,
        workbook: &Workbook,
        config: &PipelineConfig,
        envelope: &mut ImportEnvelope,
    ) {
        // CSV 只有一张表，没有独立的关联表
        if workbook.format() == WorkbookFormat::Csv {
            return;
        }

        match LinkageImporter.import_pairs(workbook, &config.link_sheet_name) {
            Ok(outcome) => {
                envelope.warnings.extend(outcome.warnings.iter().cloned());
                envelope.warnings.extend(outcome.error_warnings());
                LinkageAggregator.aggregate(&mut envelope.records, &outcome.items);
                info!(pairs = outcome.items.len(), "关联计数已回填");
            }
            Err(ImportError::SheetNotFound(name)) => {
                debug!(sheet = %name, "未找到关联工作表，跳过关联计数");
            }
            Err(e) => {
                let message = format!("关联工作表读取失败，跳过关联计数: {}", e);
                warn!("{}", message);
                envelope.warnings.push(message);
            }
        }
    }
}

#[async_trait]
impl<C, S> IncidentImporter for IncidentImporterImpl<C, S>
where
    C: PipelineConfigReader,
    S: RuleSetSource,
{
    #[instrument(skip(self, workbook), fields(batch_id))]
    async fn import_workbook(&self, workbook: &Workbook) -> ImportResult<ImportEnvelope> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        // === 步骤 1: 配置与规则快照 ===
        let config = self.load_config().await?;
        let calendar = CutCalendar::from_name(&config.business_timezone)?;
        let mut warnings: Vec<String> = Vec::new();

        let business_units = self.load_rules(RulePurpose::BusinessUnit).await?;
        let statuses = self.load_rules(RulePurpose::StatusMapping).await?;

        // === 步骤 2: 窗口策略 ===
        let window = self.resolve_window(&config, &calendar, &mut warnings);
        let deriver = RecordDeriver::new(
            &business_units,
            &statuses,
            calendar,
            window,
            config.derivation_policy(),
        );
        for rule_warning in deriver.rule_warnings() {
            warnings.push(rule_warning.to_string());
        }

        // === 步骤 3: 行抽取 ===
        let layout = SheetLayout::incidents().with_sheet_name(config.incident_sheet_name.as_str());
        let sheet = workbook.load_sheet(&layout.sheet_name)?;
        let mut extractor = RowExtractor::new(&sheet, &layout)?;
        warnings.extend(extractor.header_report().diagnostics.iter().cloned());

        // === 步骤 4~6: 映射 → 分类 → 派生（逐行，保持行序） ===
        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut summary = ImportSummary::default();

        for source in extractor.by_ref() {
            summary.total_rows += 1;
            let row = FieldMapper.to_incident(&source);

            let business_unit = match self.classify(&deriver, &row).await {
                Ok(code) => code,
                Err(e) => {
                    warn!(row_number = row.row_number, error = %e, "业务单元分类失败");
                    summary.failed += 1;
                    errors.push(RowError {
                        row: row.row_number,
                        field: "application".to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match deriver.derive_classified(&row, &business_unit) {
                Ok(record) => {
                    summary.succeeded += 1;
                    records.push(record);
                }
                Err(e) if e.is_rejection() => {
                    let message = format!("行 {}: {}，已剔除", row.row_number, e);
                    warn!(row_number = row.row_number, application = %row.application, "业务单元未识别，行已剔除");
                    summary.rejected += 1;
                    warnings.push(message);
                }
                Err(e) => {
                    warn!(row_number = row.row_number, field = e.field(), error = %e, "行校验失败");
                    summary.failed += 1;
                    errors.push(RowError {
                        row: row.row_number,
                        field: e.field().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let stats = extractor.stats();
        debug!(
            data_rows = stats.data_rows,
            empty_rows = stats.empty_rows,
            "行抽取完成"
        );

        let mut envelope = ImportEnvelope {
            batch_id,
            success: false,
            records,
            warnings,
            errors,
            summary,
        };

        // === 步骤 7: 关联计数回填 ===
        self.apply_linkage(workbook, &config, &mut envelope);

        envelope.summary.warnings = envelope.warnings.len();
        envelope.success = !envelope.records.is_empty() || envelope.errors.is_empty();

        info!(
            batch_id = %envelope.batch_id,
            total = envelope.summary.total_rows,
            succeeded = envelope.summary.succeeded,
            rejected = envelope.summary.rejected,
            failed = envelope.summary.failed,
            warnings = envelope.summary.warnings,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "事件导入完成"
        );

        Ok(envelope)
    }

    async fn import_file<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportEnvelope> {
        let workbook = Workbook::open(file_path.as_ref())?;
        info!(file_path = %file_path.as_ref().display(), format = ?workbook.format(), "开始导入事件报表");
        self.import_workbook(&workbook).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ConfigResult};
    use crate::domain::cut_window::{CalendarWindow, WindowKind};
    use crate::importer::incident_importer_trait::DefaultRuleSource;
    use chrono::{NaiveDate, TimeZone};

    // 内存配置（仅窗口可变，其余取默认）
    struct StaticConfig {
        window: Option<CalendarWindow>,
    }

    #[async_trait]
    impl PipelineConfigReader for StaticConfig {
        async fn get_business_timezone(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().business_timezone)
        }
        async fn get_backlog_status(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().backlog_status)
        }
        async fn get_unassigned_sentinel(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().unassigned_sentinel)
        }
        async fn get_awaiting_client_status(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().awaiting_client_status)
        }
        async fn get_unknown_business_unit(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().unknown_business_unit)
        }
        async fn get_preview_limit(&self) -> ConfigResult<usize> {
            Ok(PipelineConfig::default().preview_limit)
        }
        async fn get_incident_sheet_name(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().incident_sheet_name)
        }
        async fn get_link_sheet_name(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().link_sheet_name)
        }
        async fn get_tag_sheet_name(&self) -> ConfigResult<String> {
            Ok(PipelineConfig::default().tag_sheet_name)
        }
        async fn get_cut_window(&self) -> ConfigResult<Option<CalendarWindow>> {
            Ok(self.window)
        }
    }

    // 总是失败的外部分类器
    struct BrokenClassifier;

    #[async_trait]
    impl BusinessUnitClassifier for BrokenClassifier {
        async fn classify(&self, _application: &str, _unknown_code: &str) -> ImportResult<String> {
            Err(ImportError::InternalError("分类服务不可用".to_string()))
        }
    }

    const HEADER: &str = "Ticket,Fecha de creación,Aplicación,Resumen,Prioridad,Estado,Información adicional,Ticket vinculado\n";

    fn csv(rows: &str) -> Workbook {
        Workbook::from_bytes(WorkbookFormat::Csv, format!("{}{}", HEADER, rows).into_bytes())
    }

    fn weekly_window() -> CalendarWindow {
        CalendarWindow::new(
            NaiveDate::from_ymd_opt(2025, 9, 19).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 25).unwrap(),
            WindowKind::Weekly,
        )
    }

    fn importer(window: Option<CalendarWindow>) -> IncidentImporterImpl<StaticConfig, DefaultRuleSource> {
        IncidentImporterImpl::new(StaticConfig { window }, DefaultRuleSource)
            .with_clock(Utc.with_ymd_and_hms(2025, 9, 22, 15, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_mixed_rows_partial_success() {
        let workbook = csv(
            "REQ-1,19/09/2025 10:00,Somos Belcorp 2.0,Login caído,Alta,Nivel 3,,\n\
             REQ-2,ayer,Somos Belcorp 2.0,Sin fecha,Alta,Nivel 3,,\n\
             REQ-3,20/09/2025 09:00,Portal interno,Desconocido,Baja,Nivel 1,,\n\
             REQ-4,21/09/2025 09:00,App Consultora,Bloqueo,Media,Pendiente de fix,JIRA-7,\n",
        );
        let envelope = importer(Some(weekly_window())).import_workbook(&workbook).await.unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.records.len(), 1);
        assert_eq!(envelope.summary.total_rows, 4);
        assert_eq!(envelope.summary.succeeded, 1);
        assert_eq!(envelope.summary.rejected, 1);
        assert_eq!(envelope.summary.failed, 2);

        let fields: Vec<(usize, &str)> = envelope
            .errors
            .iter()
            .map(|e| (e.row, e.field.as_str()))
            .collect();
        assert_eq!(fields, vec![(3, "created_at"), (5, "additional_info")]);
        assert!(envelope.warnings.iter().any(|w| w.starts_with("行 4")));
    }

    #[tokio::test]
    async fn test_missing_window_warns_and_falls_back() {
        let workbook = csv("REQ-1,22/09/2025 10:00,Somos Belcorp,Caída,Alta,Nivel 1,,\n");
        let envelope = importer(None).import_workbook(&workbook).await.unwrap();

        assert!(envelope.records[0].in_window);
        assert!(envelope.warnings.iter().any(|w| w.contains("2025-09-22..=2025-09-28")));
        assert_eq!(envelope.summary.warnings, envelope.warnings.len());
    }

    #[tokio::test]
    async fn test_invalid_configured_window_falls_back() {
        let bad = CalendarWindow::new(
            NaiveDate::from_ymd_opt(2025, 9, 18).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 25).unwrap(),
            WindowKind::Weekly,
        );
        let workbook = csv("REQ-1,22/09/2025 10:00,Somos Belcorp,Caída,Alta,Nivel 1,,\n");
        let envelope = importer(Some(bad)).import_workbook(&workbook).await.unwrap();

        assert!(envelope.warnings[0].contains("校验失败"));
        assert!(envelope.records[0].in_window);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_row_error() {
        let workbook = csv("REQ-1,19/09/2025 10:00,Somos Belcorp,Caída,Alta,Nivel 1,,\n");
        let envelope = importer(Some(weekly_window()))
            .with_classifier(Arc::new(BrokenClassifier))
            .import_workbook(&workbook)
            .await
            .unwrap();

        assert!(!envelope.success);
        assert_eq!(envelope.errors[0].field, "application");
        assert!(envelope.errors[0].message.contains("分类服务不可用"));
    }

    #[tokio::test]
    async fn test_missing_sheet_is_structural() {
        let mut xlsx = rust_xlsxwriter::Workbook::new();
        let sheet = xlsx.add_worksheet();
        sheet.set_name("Resumen").unwrap();
        sheet.write_string(0, 0, "Ticket").unwrap();
        let workbook = Workbook::from_bytes(WorkbookFormat::Xlsx, xlsx.save_to_buffer().unwrap());

        let result = importer(None).import_workbook(&workbook).await;
        match result {
            Err(ImportError::SheetNotFound(name)) => assert_eq!(name, "Reporte"),
            other => panic!("期望 SheetNotFound，实际 {:?}", other.map(|e| e.batch_id)),
        }
    }

    #[tokio::test]
    async fn test_config_failure_aborts() {
        struct FailingConfig;

        #[async_trait]
        impl PipelineConfigReader for FailingConfig {
            async fn get_business_timezone(&self) -> ConfigResult<String> {
                Err(ConfigError::Lock("poisoned".to_string()))
            }
            async fn get_backlog_status(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_unassigned_sentinel(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_awaiting_client_status(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_unknown_business_unit(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_preview_limit(&self) -> ConfigResult<usize> {
                Ok(0)
            }
            async fn get_incident_sheet_name(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_link_sheet_name(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_tag_sheet_name(&self) -> ConfigResult<String> {
                Ok(String::new())
            }
            async fn get_cut_window(&self) -> ConfigResult<Option<CalendarWindow>> {
                Ok(None)
            }
        }

        let importer = IncidentImporterImpl::new(FailingConfig, DefaultRuleSource);
        let err = importer.import_workbook(&csv("")).await.unwrap_err();
        assert!(matches!(err, ImportError::ConfigReadError { .. }));
    }
}
