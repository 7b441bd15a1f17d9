use chrono::NaiveDate;
use serde::Serialize;

use crate::band::Band;

/// A single cell of a loaded worksheet, already stripped of spreadsheet
/// formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    /// Display form used for headers, names and stored assessment values.
    pub fn as_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            CellValue::Date(d) => d.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(EMPTY)
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// A complete, already-loaded workbook snapshot.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentColumn {
    pub col_idx: usize,
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub sheet_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Submitted,
    NotSubmitted,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentOutcome {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub value: String,
    pub status: CellStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentCompletionRecord {
    pub student_name: String,
    pub subject: String,
    pub class_label: String,
    pub total_due: usize,
    pub submitted: usize,
    pub not_submitted: usize,
    pub ignored: usize,
    pub has_due: bool,
    pub completion_rate: f64,
    /// `N/A` when nothing was due, never the zero-completion band.
    pub band: Band,
    pub assessments: Vec<AssessmentOutcome>,
}

impl StudentCompletionRecord {
    /// The rate that takes part in averages, `None` when nothing was due.
    pub fn eligible_rate(&self) -> Option<f64> {
        self.has_due.then_some(self.completion_rate)
    }
}

/// Everything the engine extracted from one worksheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    pub sheet_name: String,
    /// Export the sheet came from when several are analyzed together.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub subject: String,
    pub class_label: String,
    pub assessments: Vec<AssessmentColumn>,
    pub students: Vec<StudentCompletionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSheet {
    pub sheet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CompletionTrend {
    pub week_label: String,
    pub reference_date: NaiveDate,
    pub average_completion: Option<f64>,
    pub eligible_records: i64,
    pub class_count: i64,
}
