use crate::band::Band;
use crate::cells::interpret_cell;
use crate::config::StrayTextPolicy;
use crate::due_date::DueWindow;
use crate::models::{
    AssessmentColumn, AssessmentOutcome, CellStatus, Sheet, StudentCompletionRecord,
};

pub fn completion_rate(submitted: usize, total_due: usize) -> f64 {
    if total_due == 0 {
        0.0
    } else {
        100.0 * submitted as f64 / total_due as f64
    }
}

/// Folds the due assessment cells of one student row into a completion
/// record.
pub struct StudentRecordBuilder<'a> {
    subject: &'a str,
    class_label: &'a str,
    columns: Vec<&'a AssessmentColumn>,
    stray_text: StrayTextPolicy,
}

impl<'a> StudentRecordBuilder<'a> {
    /// Only the columns that fall inside `window` are kept.
    pub fn new(
        subject: &'a str,
        class_label: &'a str,
        columns: &'a [AssessmentColumn],
        window: DueWindow,
        stray_text: StrayTextPolicy,
    ) -> Self {
        Self {
            subject,
            class_label,
            columns: columns.iter().filter(|c| window.is_due(c.due_date)).collect(),
            stray_text,
        }
    }

    pub fn due_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn build(
        &self,
        sheet: &Sheet,
        row: usize,
        student_name: String,
    ) -> StudentCompletionRecord {
        let mut record = StudentCompletionRecord {
            student_name,
            subject: self.subject.to_string(),
            class_label: self.class_label.to_string(),
            total_due: 0,
            submitted: 0,
            not_submitted: 0,
            ignored: 0,
            has_due: false,
            completion_rate: 0.0,
            band: Band::NotAvailable,
            assessments: Vec::with_capacity(self.columns.len()),
        };

        for column in &self.columns {
            let value = sheet.cell(row, column.col_idx);
            let status = interpret_cell(value, self.stray_text);
            match status {
                CellStatus::Submitted => {
                    record.total_due += 1;
                    record.submitted += 1;
                }
                CellStatus::NotSubmitted => {
                    record.total_due += 1;
                    record.not_submitted += 1;
                }
                CellStatus::Ignored => record.ignored += 1,
            }
            record.assessments.push(AssessmentOutcome {
                title: column.title.clone(),
                due_date: column.due_date,
                value: value.as_display(),
                status,
            });
        }

        record.has_due = record.total_due > 0;
        record.completion_rate = completion_rate(record.submitted, record.total_due);
        record.band = Band::from_percentage(record.eligible_rate());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 22).unwrap()
    }

    fn column(col_idx: usize, due_in_days: i64) -> AssessmentColumn {
        AssessmentColumn {
            col_idx,
            title: format!("A{col_idx}"),
            due_date: Some(today() + chrono::Duration::days(due_in_days)),
            sheet_name: "03/1 Arabic".to_string(),
        }
    }

    fn row_sheet(cells: Vec<CellValue>) -> Sheet {
        Sheet {
            name: "03/1 Arabic".to_string(),
            rows: vec![cells],
        }
    }

    fn arabic_builder(columns: &[AssessmentColumn]) -> StudentRecordBuilder<'_> {
        StudentRecordBuilder::new(
            "Arabic",
            "03/1",
            columns,
            DueWindow::until(today()),
            StrayTextPolicy::Submitted,
        )
    }

    #[test]
    fn special_tokens_shape_the_denominator() {
        let columns: Vec<_> = (0..5).map(|i| column(i, -1)).collect();
        let sheet = row_sheet(vec![
            CellValue::text("M"),
            CellValue::text("I"),
            CellValue::text("AB"),
            CellValue::text("X"),
            CellValue::Number(75.0),
        ]);
        let builder = arabic_builder(&columns);
        let record = builder.build(&sheet, 0, "فاطمة علي".into());

        assert_eq!(record.total_due, 2);
        assert_eq!(record.submitted, 1);
        assert_eq!(record.not_submitted, 1);
        assert_eq!(record.ignored, 3);
        assert_eq!(record.completion_rate, 50.0);
        assert_eq!(record.band, Band::NeedsImprovement);
        assert!(record.has_due);
        assert_eq!(record.assessments.len(), 5);
    }

    #[test]
    fn future_columns_never_count() {
        let columns = vec![column(0, -1), column(1, 1)];
        let sheet = row_sheet(vec![CellValue::Number(75.0), CellValue::Number(80.0)]);
        let builder = arabic_builder(&columns);
        assert_eq!(builder.due_columns(), 1);

        let record = builder.build(&sheet, 0, "أحمد محمد".into());
        assert_eq!(record.total_due, 1);
        assert_eq!(record.submitted, 1);
        assert_eq!(record.completion_rate, 100.0);
    }

    #[test]
    fn nothing_due_means_no_due_and_zero_rate() {
        let columns = vec![column(0, 1), column(1, 2)];
        let sheet = row_sheet(vec![CellValue::Number(80.0), CellValue::Number(90.0)]);
        let builder = arabic_builder(&columns);
        let record = builder.build(&sheet, 0, "نورة سعيد".into());

        assert!(!record.has_due);
        assert_eq!(record.total_due, 0);
        assert_eq!(record.completion_rate, 0.0);
        assert_eq!(record.band, Band::NotAvailable);
        assert_eq!(record.eligible_rate(), None);
    }

    #[test]
    fn all_ignored_cells_also_mean_no_due() {
        let columns = vec![column(0, -3), column(1, -2)];
        let sheet = row_sheet(vec![CellValue::text("AB"), CellValue::text("x")]);
        let builder = arabic_builder(&columns);
        let record = builder.build(&sheet, 0, "سالم".into());

        assert!(!record.has_due);
        assert_eq!(record.ignored, 2);
    }

    #[test]
    fn short_rows_read_as_blank() {
        let columns = vec![column(0, -1), column(4, -1)];
        let sheet = row_sheet(vec![CellValue::Number(1.0)]);
        let builder = arabic_builder(&columns);
        let record = builder.build(&sheet, 0, "ليلى".into());

        assert_eq!(record.total_due, 2);
        assert_eq!(record.not_submitted, 1);
        assert_eq!(record.completion_rate, 50.0);
    }

    #[test]
    fn rate_is_bounded() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(3, 3), 100.0);
        assert!((completion_rate(1, 3) - 33.333).abs() < 0.001);
    }
}
