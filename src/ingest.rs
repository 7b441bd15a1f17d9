use serde::Serialize;
use tracing::{info, warn};

use crate::columns::ColumnClassifier;
use crate::config::{AnalysisConfig, SheetLayout, StrayTextPolicy};
use crate::due_date::{resolve_due_date, DueWindow};
use crate::error::{IngestError, SheetError};
use crate::models::{AssessmentColumn, Sheet, SheetReport, SkippedSheet, Workbook};
use crate::records::StudentRecordBuilder;
use crate::sheet_name::{collapse_whitespace, parse_sheet_name};

/// Result of one ingestion run over one or more workbook snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ingestion {
    /// Labels of the workbooks combined into this run, in input order.
    pub sources: Vec<String>,
    pub sheets: Vec<SheetReport>,
    pub skipped: Vec<SkippedSheet>,
}

impl Ingestion {
    /// Appends another workbook's results, tagging each sheet with `source`.
    pub fn absorb(&mut self, source: &str, other: Ingestion) {
        self.sources.push(source.to_string());
        self.sheets.extend(other.sheets.into_iter().map(|mut sheet| {
            sheet.source = Some(source.to_string());
            sheet
        }));
        self.skipped.extend(other.skipped.into_iter().map(|mut skipped| {
            skipped.source = Some(source.to_string());
            skipped
        }));
    }
}

pub struct SheetParser {
    classifier: ColumnClassifier,
    layout: SheetLayout,
    stray_text: StrayTextPolicy,
}

impl SheetParser {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            classifier: ColumnClassifier::new(&config.columns),
            layout: config.layout.clone(),
            stray_text: config.stray_text,
        }
    }

    pub fn parse(&self, sheet: &Sheet, window: DueWindow) -> Result<SheetReport, SheetError> {
        let (subject, class_label) = parse_sheet_name(&sheet.name)?;

        if sheet.rows.len() < self.layout.min_rows {
            return Err(SheetError::TooFewRows {
                found: sheet.rows.len(),
                required: self.layout.min_rows,
            });
        }

        let columns = self.classifier.classify(sheet, &self.layout)?;

        let assessments: Vec<AssessmentColumn> = columns
            .assessment_cols
            .iter()
            .map(|&col_idx| {
                let title = sheet.cell(self.layout.header_row, col_idx).as_display();
                let title = if title.is_empty() {
                    format!("Assessment {}", col_idx + 1)
                } else {
                    title
                };
                let due_date = resolve_due_date(
                    sheet.cell(self.layout.due_date_row, col_idx),
                    window.end,
                    &sheet.name,
                    &title,
                );
                AssessmentColumn {
                    col_idx,
                    title,
                    due_date,
                    sheet_name: sheet.name.clone(),
                }
            })
            .collect();

        let builder = StudentRecordBuilder::new(
            &subject,
            &class_label,
            &assessments,
            window,
            self.stray_text,
        );

        let students: Vec<_> = (columns.first_student_row..sheet.rows.len())
            .filter_map(|row| {
                let name = collapse_whitespace(&sheet.cell(row, columns.student_col).as_display());
                if name.is_empty() || self.classifier.is_student_label(&name) {
                    return None;
                }
                Some(builder.build(sheet, row, name))
            })
            .collect();

        if students.is_empty() {
            return Err(SheetError::NoStudents);
        }

        info!(
            sheet = %sheet.name,
            subject = %subject,
            class = %class_label,
            students = students.len(),
            assessments = assessments.len(),
            due = builder.due_columns(),
            "processed sheet"
        );

        Ok(SheetReport {
            sheet_name: sheet.name.clone(),
            source: None,
            subject,
            class_label,
            assessments,
            students,
        })
    }
}

/// Parses every sheet. A malformed sheet is skipped with a warning; only an
/// empty workbook fails the run.
pub fn ingest_workbook(
    workbook: &Workbook,
    config: &AnalysisConfig,
    window: DueWindow,
) -> Result<Ingestion, IngestError> {
    if workbook.sheets.is_empty() {
        return Err(IngestError::EmptyWorkbook);
    }

    let parser = SheetParser::new(config);
    let mut ingestion = Ingestion::default();

    for sheet in &workbook.sheets {
        match parser.parse(sheet, window) {
            Ok(report) => ingestion.sheets.push(report),
            Err(err) => {
                warn!(sheet = %sheet.name, error = %err, "skipping sheet");
                ingestion.skipped.push(SkippedSheet {
                    sheet_name: sheet.name.clone(),
                    source: None,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(ingestion)
}

/// Ingests several weekly exports into one run. Sheets for the same subject
/// and class end up in the same class once analyzed.
pub fn ingest_workbooks<'a, I>(
    workbooks: I,
    config: &AnalysisConfig,
    window: DueWindow,
) -> Result<Ingestion, IngestError>
where
    I: IntoIterator<Item = (&'a str, &'a Workbook)>,
{
    let mut combined = Ingestion::default();
    for (source, workbook) in workbooks {
        let ingestion = match ingest_workbook(workbook, config, window) {
            Err(IngestError::EmptyWorkbook) => {
                return Err(IngestError::EmptyWorkbookIn {
                    workbook: source.to_string(),
                })
            }
            other => other?,
        };
        combined.absorb(source, ingestion);
    }

    if combined.sources.is_empty() {
        return Err(IngestError::NoWorkbooks);
    }
    Ok(combined)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, NaiveDate};

    use crate::models::{CellValue, Sheet};

    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 22).unwrap()
    }

    /// Builds a sheet in the plain export layout: titles on row 0, due dates on
    /// row 2, students from row 3, assessments from column H.
    pub fn sheet(
        name: &str,
        assessments: &[(&str, i64)],
        students: &[(&str, Vec<CellValue>)],
    ) -> Sheet {
        let width = 7 + assessments.len();
        let mut header = vec![CellValue::Empty; width];
        header[0] = CellValue::text("اسم الطالب");
        let mut due = vec![CellValue::Empty; width];
        for (i, (title, offset)) in assessments.iter().enumerate() {
            header[7 + i] = CellValue::text(title);
            due[7 + i] = CellValue::Date(today() + Duration::days(*offset));
        }

        let mut rows = vec![header, vec![CellValue::Empty; width], due];
        for (student, cells) in students {
            let mut row = vec![CellValue::Empty; width];
            row[0] = CellValue::text(student);
            for (i, cell) in cells.iter().enumerate() {
                row[7 + i] = cell.clone();
            }
            rows.push(row);
        }
        Sheet {
            name: name.to_string(),
            rows,
        }
    }

    pub fn n(value: f64) -> CellValue {
        CellValue::Number(value)
    }

    pub fn t(value: &str) -> CellValue {
        CellValue::text(value)
    }
}
