use chrono::{Datelike, Duration, NaiveDate};
use tracing::warn;

use crate::error::DueDateError;
use crate::models::CellValue;

/// Formats tried in order. Day-first wins whenever day and month could both be
/// read either way. Two-digit years come first since `%Y` also accepts "25".
const FULL_DATE_FORMATS: &[&str] = &[
    "%d/%m/%y",
    "%d-%m-%y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// A year-less date further than this past the reference date belongs to
/// the previous school year ("Dec 29" read in early January).
const YEAR_ROLLOVER_DAYS: i64 = 183;

/// LMS exports omit the year ("Oct 31").
const YEARLESS_FORMATS: &[&str] = &["%b %d %Y", "%d %b %Y", "%B %d %Y", "%d %B %Y"];

const ARABIC_MONTHS: &[(&str, u32)] = &[
    ("يناير", 1),
    ("فبراير", 2),
    ("مارس", 3),
    ("أبريل", 4),
    ("ابريل", 4),
    ("مايو", 5),
    ("يونيو", 6),
    ("يوليو", 7),
    ("أغسطس", 8),
    ("اغسطس", 8),
    ("سبتمبر", 9),
    ("أكتوبر", 10),
    ("اكتوبر", 10),
    ("نوفمبر", 11),
    ("ديسمبر", 12),
];

/// Inclusive window of due dates that count. `end` is the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DueWindow {
    pub fn until(reference_date: NaiveDate) -> Self {
        Self {
            start: None,
            end: reference_date,
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    /// A column without a resolvable date is never due.
    pub fn is_due(&self, due_date: Option<NaiveDate>) -> bool {
        match due_date {
            None => false,
            Some(date) => date <= self.end && self.start.is_none_or(|start| date >= start),
        }
    }
}

/// Parses a due-date cell. Blank cells and `-` resolve to `Ok(None)`.
/// `reference_date` supplies the year for year-less forms.
pub fn parse_due_date(
    value: &CellValue,
    reference_date: NaiveDate,
) -> Result<Option<NaiveDate>, DueDateError> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::Date(date) => Ok(Some(*date)),
        CellValue::Number(_) => Err(DueDateError(value.as_display())),
        CellValue::Text(raw) => parse_text(raw, reference_date),
    }
}

/// Same as [`parse_due_date`] but recovers unparsable dates as "no date".
pub fn resolve_due_date(
    value: &CellValue,
    reference_date: NaiveDate,
    sheet: &str,
    column: &str,
) -> Option<NaiveDate> {
    match parse_due_date(value, reference_date) {
        Ok(date) => date,
        Err(err) => {
            warn!(sheet, column, error = %err, "treating assessment as not due");
            None
        }
    }
}

fn parse_text(raw: &str, reference_date: NaiveDate) -> Result<Option<NaiveDate>, DueDateError> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() || text == "-" {
        return Ok(None);
    }

    // "2025-10-22 00:00:00" and "2025-10-22T08:00:00"
    let date_part = text.split(['T', ' ']).next().unwrap_or(&text);
    if date_part.len() < text.len() {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Ok(Some(date));
        }
    }

    for format in FULL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Ok(Some(date));
        }
    }

    match parse_yearless(&text, reference_date) {
        Some(date) => Ok(Some(date)),
        None => Err(DueDateError(raw.to_string())),
    }
}

fn parse_yearless(text: &str, reference_date: NaiveDate) -> Option<NaiveDate> {
    let in_year = |year: i32| {
        let with_year = format!("{text} {year}");
        YEARLESS_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(&with_year, format).ok())
            .or_else(|| parse_arabic_month(text, year))
    };

    let date = in_year(reference_date.year())?;
    if date - reference_date > Duration::days(YEAR_ROLLOVER_DAYS) {
        return in_year(reference_date.year() - 1).or(Some(date));
    }
    Some(date)
}

fn parse_arabic_month(text: &str, year: i32) -> Option<NaiveDate> {
    let (name, month) = ARABIC_MONTHS.iter().find(|(name, _)| text.contains(name))?;
    let day: u32 = text.replace(name, "").trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, *month, day)
}
