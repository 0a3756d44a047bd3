// ==========================================
// 运维事件报表导入系统 - 行抽取器
// ==========================================
// 职责: 逐行遍历工作表，按布局归一化各列，识别分类标记行
// 规则: 惰性、有限、单次前向遍历（不可重启）
// 规则: 第 1 行为表头；表头不足最后声明列 → 结构性错误
// 规则: 标记行之前的数据行丢弃（无类别可盖章）
// ==========================================

use crate::domain::cell::NormalizedCell;
use crate::domain::incident::{SourceField, SourceRow};
use crate::engine::cell_normalizer::CellNormalizer;
use crate::engine::text_norm::tokenize;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::header_matcher::{HeaderMatchReport, HeaderMatcher, HeaderProbe};
use crate::importer::sheet_layout::{ResolvedColumn, SheetLayout};
use crate::importer::workbook::Sheet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ==========================================
// ExtractionStats - 抽取统计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub data_rows: usize,   // 产出的 SourceRow
    pub empty_rows: usize,  // 全空跳过
    pub marker_rows: usize, // 分类标记行
    pub orphan_rows: usize, // 首个标记之前的数据行（丢弃）
}

// ==========================================
// RowExtractor - 行抽取迭代器
// ==========================================
pub struct RowExtractor<'a> {
    sheet: &'a Sheet,
    columns: Vec<ResolvedColumn>,
    markers: Vec<String>,
    header_report: HeaderMatchReport,
    next_row: usize,
    current_category: Option<String>,
    stats: ExtractionStats,
}

impl<'a> RowExtractor<'a> {
    /// 校验表头并准备抽取
    ///
    /// # 返回
    /// - Err(EmptySheet): 无表头行
    /// - Err(HeaderCountMismatch): 表头行短于最后声明的列
    /// - Ok: 表头文本不匹配只记录在 header_report 中
    pub fn new(sheet: &'a Sheet, layout: &SheetLayout) -> ImportResult<Self> {
        let columns = layout.resolve()?;
        let header = sheet
            .rows
            .first()
            .ok_or_else(|| ImportError::EmptySheet(sheet.name.clone()))?;

        let header_len = header
            .iter()
            .rposition(|c| !CellNormalizer.normalize_text(c).trim().is_empty())
            .map_or(0, |i| i + 1);
        let expected = columns.iter().map(|c| c.index + 1).max().unwrap_or(0);
        if header_len < expected {
            return Err(ImportError::HeaderCountMismatch {
                sheet: sheet.name.clone(),
                expected,
                actual: header_len,
            });
        }

        let probes: Vec<HeaderProbe> = columns
            .iter()
            .map(|c| HeaderProbe {
                letter: c.spec.letter.clone(),
                expected: c.spec.header.clone(),
                actual: CellNormalizer.normalize_text(sheet.cell(0, c.index)),
            })
            .collect();
        let header_report = HeaderMatcher.validate(&probes);
        for diagnostic in &header_report.diagnostics {
            warn!(sheet = %sheet.name, "{}", diagnostic);
        }

        Ok(Self {
            sheet,
            columns,
            markers: layout.marker_keywords.clone(),
            header_report,
            next_row: 1,
            current_category: None,
            stats: ExtractionStats::default(),
        })
    }

    pub fn header_report(&self) -> &HeaderMatchReport {
        &self.header_report
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    fn uses_markers(&self) -> bool {
        !self.markers.is_empty()
    }

    /// 标记行: 已声明列中仅一个单元格有内容，且其词元命中标记词表
    fn marker_text(&self, row_idx: usize) -> Option<String> {
        let mut filled = self
            .columns
            .iter()
            .map(|c| CellNormalizer.normalize_text(self.sheet.cell(row_idx, c.index)))
            .filter(|t| !t.trim().is_empty());
        let first = filled.next()?;
        if filled.next().is_some() {
            return None;
        }

        let tokens = tokenize(&first);
        self.markers
            .iter()
            .any(|m| tokens.iter().any(|t| t == m))
            .then(|| first.trim().to_string())
    }

    fn normalize_row(&self, row_idx: usize) -> Vec<SourceField> {
        self.columns
            .iter()
            .map(|c| {
                let raw = self.sheet.cell(row_idx, c.index);
                let cell = if c.spec.link {
                    CellNormalizer.normalize(raw)
                } else {
                    NormalizedCell::plain(CellNormalizer.normalize_text(raw))
                };
                SourceField {
                    key: c.spec.key.clone(),
                    header: c.spec.header.clone(),
                    cell,
                }
            })
            .collect()
    }
}

impl Iterator for RowExtractor<'_> {
    type Item = SourceRow;

    fn next(&mut self) -> Option<SourceRow> {
        while self.next_row < self.sheet.row_count() {
            let row_idx = self.next_row;
            self.next_row += 1;
            let row_number = row_idx + 1;

            if self.uses_markers() {
                if let Some(category) = self.marker_text(row_idx) {
                    debug!(row_number, category = %category, "识别到分类标记行");
                    self.current_category = Some(category);
                    self.stats.marker_rows += 1;
                    continue;
                }
            }

            let fields = self.normalize_row(row_idx);
            if fields.iter().all(|f| f.cell.is_blank()) {
                self.stats.empty_rows += 1;
                continue;
            }

            if self.uses_markers() && self.current_category.is_none() {
                debug!(row_number, "首个分类标记之前的数据行，已丢弃");
                self.stats.orphan_rows += 1;
                continue;
            }

            self.stats.data_rows += 1;
            return Some(SourceRow {
                row_number,
                fields,
                category: self.current_category.clone(),
            });
        }
        None
    }
}
