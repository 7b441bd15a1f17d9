use tracing::debug;

use crate::config::{ColumnRules, SheetLayout};
use crate::error::ColumnError;
use crate::models::Sheet;

/// Folds a header for keyword matching: lowercase, Arabic diacritics and
/// tatweel dropped, alef variants unified, whitespace collapsed.
pub fn normalize_header(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .filter(|c| !matches!(*c, '\u{064B}'..='\u{0652}' | '\u{0670}' | '\u{0640}'))
        .map(|c| match c {
            'أ' | 'إ' | 'آ' => 'ا',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMatcher {
    Contains(String),
    Equals(String),
    Blank,
}

impl HeaderMatcher {
    pub fn contains(keyword: &str) -> Self {
        HeaderMatcher::Contains(normalize_header(keyword))
    }

    /// `normalized` must already have gone through [`normalize_header`].
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            HeaderMatcher::Contains(keyword) => !keyword.is_empty() && normalized.contains(keyword),
            HeaderMatcher::Equals(value) => normalized == value,
            HeaderMatcher::Blank => normalized.is_empty() || normalized == "-",
        }
    }
}

/// Ordered matchers; earlier entries win when several could apply.
#[derive(Debug, Clone, Default)]
pub struct MatcherSet(Vec<HeaderMatcher>);

impl MatcherSet {
    pub fn from_keywords<'a, I: IntoIterator<Item = &'a String>>(keywords: I) -> Self {
        MatcherSet(keywords.into_iter().map(|k| HeaderMatcher::contains(k)).collect())
    }

    pub fn push(&mut self, matcher: HeaderMatcher) {
        self.0.push(matcher);
    }

    pub fn matchers(&self) -> &[HeaderMatcher] {
        &self.0
    }

    pub fn any(&self, normalized: &str) -> bool {
        self.0.iter().any(|m| m.matches(normalized))
    }
}

/// Column positions resolved for one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetColumns {
    pub student_col: usize,
    pub label_row: usize,
    pub first_student_row: usize,
    pub assessment_start: usize,
    pub assessment_cols: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    student: MatcherSet,
    summary: MatcherSet,
    excluded: MatcherSet,
    default_start: usize,
}

impl ColumnClassifier {
    pub fn new(rules: &ColumnRules) -> Self {
        let summary = MatcherSet::from_keywords(&rules.summary_labels);
        let mut excluded =
            MatcherSet::from_keywords(rules.summary_labels.iter().chain(&rules.excluded_labels));
        excluded.push(HeaderMatcher::Equals("nan".to_string()));
        Self {
            student: MatcherSet::from_keywords(&rules.student_labels),
            summary,
            excluded,
            default_start: rules.default_assessment_start,
        }
    }

    pub fn classify(
        &self,
        sheet: &Sheet,
        layout: &SheetLayout,
    ) -> Result<SheetColumns, ColumnError> {
        let (label_row, student_col) = self.locate_student_column(sheet, layout)?;
        let first_student_row = if label_row >= layout.first_data_row {
            label_row + 1
        } else {
            layout.first_data_row
        };

        let width = sheet.width();
        let headers: Vec<Vec<String>> = (0..width)
            .map(|col| column_headers(sheet, col, layout.header_row, label_row))
            .collect();

        let assessment_start = self.assessment_start(&headers);
        let assessment_cols: Vec<usize> = (assessment_start..width)
            .filter(|col| *col != student_col)
            .filter(|col| {
                let title = title_text(sheet, *col, layout.header_row, label_row);
                let keep = !self.is_excluded(&title)
                    && !headers[*col].iter().any(|h| self.excluded.any(h));
                if !keep {
                    debug!(sheet = %sheet.name, col, title = %title, "column excluded");
                }
                keep
            })
            .collect();

        Ok(SheetColumns {
            student_col,
            label_row,
            first_student_row,
            assessment_start,
            assessment_cols,
        })
    }

    /// Returns `(row, col)` of the student-name label. A cell that is exactly a
    /// roster label (`Students`, `اسم`) beats one that merely contains it, and
    /// columns before the default assessment start beat later ones.
    pub fn locate_student_column(
        &self,
        sheet: &Sheet,
        layout: &SheetLayout,
    ) -> Result<(usize, usize), ColumnError> {
        let scan_rows = layout.header_scan_rows.max(layout.header_row + 1);
        let rows: Vec<(usize, Vec<String>)> = (layout.header_row..scan_rows)
            .map(|row| {
                let normalized = (0..sheet.width())
                    .map(|col| normalize_header(&sheet.cell(row, col).as_display()))
                    .collect();
                (row, normalized)
            })
            .collect();

        for leading_only in [true, false] {
            let in_scope = |col: usize| !leading_only || col < self.default_start;

            for (row, headers) in &rows {
                let exact = (0..headers.len())
                    .find(|&col| in_scope(col) && self.is_exact_label(&headers[col]));
                if let Some(col) = exact {
                    return Ok((*row, col));
                }
            }

            for (row, headers) in &rows {
                for matcher in self.student.matchers() {
                    let found = (0..headers.len())
                        .find(|&col| in_scope(col) && matcher.matches(&headers[col]));
                    if let Some(col) = found {
                        return Ok((*row, col));
                    }
                }
            }
        }

        Err(ColumnError::NoStudentColumn {
            scanned_rows: scan_rows,
        })
    }

    /// Assessments begin right after the last summary column found before the
    /// default start, otherwise at the default start.
    pub fn assessment_start(&self, headers: &[Vec<String>]) -> usize {
        headers
            .iter()
            .enumerate()
            .take(self.default_start)
            .filter(|(_, texts)| texts.iter().any(|h| self.summary.any(h)))
            .map(|(idx, _)| idx + 1)
            .last()
            .unwrap_or(self.default_start)
    }

    pub fn is_excluded(&self, header: &str) -> bool {
        let normalized = normalize_header(header);
        HeaderMatcher::Blank.matches(&normalized) || self.excluded.any(&normalized)
    }

    /// True for a repeated roster header such as `Students` in a name cell.
    pub fn is_student_label(&self, value: &str) -> bool {
        self.is_exact_label(&normalize_header(value))
    }

    fn is_exact_label(&self, normalized: &str) -> bool {
        let singular = normalized.strip_suffix('s').unwrap_or(normalized);
        self.student.matchers().iter().any(|m| match m {
            HeaderMatcher::Contains(keyword) => keyword == normalized || keyword == singular,
            _ => false,
        })
    }
}

fn column_headers(sheet: &Sheet, col: usize, header_row: usize, label_row: usize) -> Vec<String> {
    let mut texts = vec![normalize_header(&sheet.cell(header_row, col).as_display())];
    if label_row != header_row {
        texts.push(normalize_header(&sheet.cell(label_row, col).as_display()));
    }
    texts
}

fn title_text(sheet: &Sheet, col: usize, header_row: usize, label_row: usize) -> String {
    let title = normalize_header(&sheet.cell(header_row, col).as_display());
    if HeaderMatcher::Blank.matches(&title) {
        normalize_header(&sheet.cell(label_row, col).as_display())
    } else {
        title
    }
}
