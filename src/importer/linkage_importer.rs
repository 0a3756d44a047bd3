// ==========================================
// 运维事件报表导入系统 - 关联数据导入
// ==========================================
// 职责: 父子工单表 / 标签表的兄弟导入管道
// 规则: 与事件主表共用 RowExtractor + CellNormalizer
// 规则: 行级错误只剔除该行，结构性错误中止该表
// ==========================================

use crate::domain::incident::{RowError, SourceRow};
use crate::domain::linkage::{LinkGroup, ParentChildPair, TagGroups, TagRow};
use crate::engine::linkage_aggregator::LinkageAggregator;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::FieldMapper;
use crate::importer::row_extractor::{ExtractionStats, RowExtractor};
use crate::importer::sheet_layout::SheetLayout;
use crate::importer::workbook::Workbook;
use serde::Serialize;
use tracing::{info, warn};

// ==========================================
// LinkageOutcome - 单张关联表的导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkageOutcome<T> {
    pub sheet_name: String,
    pub items: Vec<T>,
    pub errors: Vec<RowError>,
    pub warnings: Vec<String>, // 表头诊断
    pub stats: ExtractionStats,
}

impl<T> LinkageOutcome<T> {
    /// 行级错误折算为警告文本（并入事件导入信封时使用）
    pub fn error_warnings(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| {
                format!(
                    "工作表 {} 行 {} [{}]: {}",
                    self.sheet_name, e.row, e.field, e.message
                )
            })
            .collect()
    }
}

pub struct LinkageImporter;

impl LinkageImporter {
    /// 导入父子工单对
    pub fn import_pairs(
        &self,
        workbook: &Workbook,
        sheet_name: &str,
    ) -> ImportResult<LinkageOutcome<ParentChildPair>> {
        let layout = SheetLayout::link_pairs().with_sheet_name(sheet_name);
        extract(workbook, &layout, |row| FieldMapper.to_link_pair(row))
    }

    /// 导入标签行（类别取自前置分类标记行）
    pub fn import_tags(
        &self,
        workbook: &Workbook,
        sheet_name: &str,
    ) -> ImportResult<LinkageOutcome<TagRow>> {
        let layout = SheetLayout::tags().with_sheet_name(sheet_name);
        extract(workbook, &layout, |row| FieldMapper.to_tag(row))
    }

    /// 父子工单表 → 按子工单分组
    pub fn link_groups(&self, workbook: &Workbook, sheet_name: &str) -> ImportResult<Vec<LinkGroup>> {
        let outcome = self.import_pairs(workbook, sheet_name)?;
        Ok(LinkageAggregator.group_by_child(&outcome.items))
    }

    /// 标签表 → 分组视图
    pub fn tag_groups(&self, workbook: &Workbook, sheet_name: &str) -> ImportResult<TagGroups> {
        let outcome = self.import_tags(workbook, sheet_name)?;
        Ok(LinkageAggregator.group_tags(&outcome.items))
    }
}

fn extract<T, F>(workbook: &Workbook, layout: &SheetLayout, map: F) -> ImportResult<LinkageOutcome<T>>
where
    F: Fn(&SourceRow) -> Result<T, RowError>,
{
    let sheet = workbook.load_sheet(&layout.sheet_name)?;
    let mut extractor = RowExtractor::new(&sheet, layout)?;
    let warnings = extractor.header_report().diagnostics.clone();

    let mut items = Vec::new();
    let mut errors = Vec::new();
    for row in extractor.by_ref() {
        match map(&row) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(sheet = %sheet.name, row_number = e.row, field = %e.field, "关联行校验失败");
                errors.push(e);
            }
        }
    }

    let stats = extractor.stats();
    info!(
        sheet = %sheet.name,
        kind = %layout.kind,
        items = items.len(),
        errors = errors.len(),
        "关联表导入完成"
    );

    Ok(LinkageOutcome {
        sheet_name: sheet.name.clone(),
        items,
        errors,
        warnings,
        stats,
    })
}
