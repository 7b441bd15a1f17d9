use thiserror::Error;

/// The worksheet title does not follow a known `<class> <subject>` convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetNameError {
    #[error("no class label found in sheet name '{0}'")]
    NoClassLabel(String),
    #[error("sheet name '{0}' has a class label but no subject")]
    MissingSubject(String),
}

/// The header rows do not describe a usable roster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("no student name column in the first {scanned_rows} rows")]
    NoStudentColumn { scanned_rows: usize },
}

/// A due-date cell that none of the accepted formats understands. Recovered
/// locally by treating the column as not due.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized due date '{0}'")]
pub struct DueDateError(pub String);

/// Reasons a single sheet is skipped. Never fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error(transparent)]
    SheetName(#[from] SheetNameError),
    #[error(transparent)]
    Columns(#[from] ColumnError),
    #[error("sheet has {found} rows, at least {required} are needed")]
    TooFewRows { found: usize, required: usize },
    #[error("sheet has no student rows")]
    NoStudents,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("workbook contains no sheets")]
    EmptyWorkbook,
    #[error("workbook '{workbook}' contains no sheets")]
    EmptyWorkbookIn { workbook: String },
    #[error("no workbooks given")]
    NoWorkbooks,
}
