// ==========================================
// 运维事件报表导入系统 - 工作簿读取器
// ==========================================
// 支持: Excel (.xlsx/.xlsm) / CSV (.csv)
// 职责: 原始字节 → 指定工作表的 RawCellValue 网格（绝对行列位置）
// 红线: 不做公式求值；只定位一个具名工作表
// ==========================================

use crate::domain::cell::{HyperlinkText, RawCellValue};
use crate::domain::types::WorkbookFormat;
use crate::engine::cell_normalizer::CellNormalizer;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{Data, Range, Reader, Xlsx};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

static EMPTY_CELL: RawCellValue = RawCellValue::Empty;

// ==========================================
// Sheet - 单个工作表
// ==========================================
// rows[0] 对应工作表第 1 行；列下标 0 对应 A 列
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<RawCellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<RawCellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 越界单元格视为空
    pub fn cell(&self, row: usize, col: usize) -> &RawCellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

// ==========================================
// Workbook - 已读入内存的工作簿
// ==========================================
pub struct Workbook {
    format: WorkbookFormat,
    bytes: Vec<u8>,
}

impl Workbook {
    pub fn from_bytes(format: WorkbookFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    /// 按路径读取（扩展名决定格式）
    pub fn open<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let format = WorkbookFormat::from_extension(&ext)
            .ok_or_else(|| ImportError::UnsupportedFormat(ext.clone()))?;

        let bytes = std::fs::read(path)?;
        debug!(path = %path.display(), size = bytes.len(), "工作簿已读入内存");
        Ok(Self::from_bytes(format, bytes))
    }

    pub fn format(&self) -> WorkbookFormat {
        self.format
    }

    /// 定位并读取具名工作表
    ///
    /// # 规则
    /// - 先精确匹配名称，再忽略大小写/首尾空白匹配
    /// - 不存在 → SheetNotFound（结构性错误）
    /// - CSV 只有一张表，代表所请求的工作表
    pub fn load_sheet(&self, sheet_name: &str) -> ImportResult<Sheet> {
        match self.format {
            WorkbookFormat::Xlsx => self.load_xlsx_sheet(sheet_name),
            WorkbookFormat::Csv => self.load_csv_sheet(sheet_name),
        }
    }

    fn load_xlsx_sheet(&self, sheet_name: &str) -> ImportResult<Sheet> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(self.bytes.as_slice()))?;

        let names = workbook.sheet_names();
        let name = resolve_sheet_name(&names, sheet_name)
            .ok_or_else(|| ImportError::SheetNotFound(sheet_name.to_string()))?;

        let values = workbook.worksheet_range(&name)?;
        let mut rows = place_values(&values);

        // 公式单元格: 保留公式文本，结果包裹在内；HYPERLINK 公式还原为超链接
        if let Ok(formulas) = workbook.worksheet_formula(&name) {
            overlay_formulas(&mut rows, &formulas);
        }

        debug!(sheet = %name, rows = rows.len(), "工作表读取完成");
        Ok(Sheet::new(name, rows))
    }

    fn load_csv_sheet(&self, sheet_name: &str) -> ImportResult<Sheet> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(self.bytes.as_slice());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|value| {
                        if value.is_empty() {
                            RawCellValue::Empty
                        } else {
                            RawCellValue::text(value)
                        }
                    })
                    .collect(),
            );
        }

        Ok(Sheet::new(sheet_name, rows))
    }
}

fn resolve_sheet_name(names: &[String], wanted: &str) -> Option<String> {
    names
        .iter()
        .find(|n| n.as_str() == wanted)
        .or_else(|| {
            let wanted = wanted.trim().to_lowercase();
            names.iter().find(|n| n.trim().to_lowercase() == wanted)
        })
        .cloned()
}

fn place_values(range: &Range<Data>) -> Vec<Vec<RawCellValue>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let (start_row, start_col) = (start_row as usize, start_col as usize);

    let mut rows: Vec<Vec<RawCellValue>> = vec![Vec::new(); start_row];
    for cells in range.rows() {
        let mut row = vec![RawCellValue::Empty; start_col];
        row.extend(cells.iter().map(from_calamine));
        rows.push(row);
    }
    rows
}

fn overlay_formulas(rows: &mut Vec<Vec<RawCellValue>>, formulas: &Range<String>) {
    let Some((start_row, start_col)) = formulas.start() else {
        return;
    };

    for (r, c, formula) in formulas.used_cells() {
        let (row_idx, col_idx) = (start_row as usize + r, start_col as usize + c);
        if rows.len() <= row_idx {
            rows.resize(row_idx + 1, Vec::new());
        }
        let row = &mut rows[row_idx];
        if row.len() <= col_idx {
            row.resize(col_idx + 1, RawCellValue::Empty);
        }

        let cached = std::mem::take(&mut row[col_idx]);
        let result = match parse_hyperlink_formula(formula) {
            Some((url, label)) => {
                let visible = match cached {
                    RawCellValue::Empty => label.unwrap_or_default(),
                    other => CellNormalizer.normalize_text(&other),
                };
                RawCellValue::Hyperlink {
                    url,
                    text: HyperlinkText::Plain(visible),
                }
            }
            None => cached,
        };
        row[col_idx] = RawCellValue::formula(formula.as_str(), result);
    }
}

/// 解析 HYPERLINK("url"[, "label"]) 公式
pub fn parse_hyperlink_formula(formula: &str) -> Option<(String, Option<String>)> {
    let re = Regex::new(
        r#"(?i)^\s*=?\s*HYPERLINK\(\s*"([^"]*)"\s*(?:[,;]\s*"([^"]*)"\s*)?\)\s*$"#,
    )
    .ok()?;
    let caps = re.captures(formula)?;
    let url = caps.get(1)?.as_str().to_string();
    let label = caps.get(2).map(|m| m.as_str().to_string());
    Some((url, label))
}

fn from_calamine(data: &Data) -> RawCellValue {
    match data {
        Data::Empty => RawCellValue::Empty,
        Data::String(s) => RawCellValue::Text(s.clone()),
        Data::Int(i) => RawCellValue::Number(*i as f64),
        Data::Float(f) => RawCellValue::Number(*f),
        Data::Bool(b) => RawCellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(RawCellValue::DateTime)
            .unwrap_or(RawCellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(RawCellValue::DateTime)
            .unwrap_or_else(|_| RawCellValue::Text(s.clone())),
        Data::DurationIso(s) => RawCellValue::Text(s.clone()),
        // 错误单元格（#N/A 等）按空处理
        Data::Error(_) => RawCellValue::Empty,
    }
}
