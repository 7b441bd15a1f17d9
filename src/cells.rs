use crate::config::StrayTextPolicy;
use crate::models::{CellStatus, CellValue};

/// Tokens that pull a cell out of the student's denominator.
pub const IGNORED_TOKENS: [&str; 3] = ["I", "AB", "X"];
pub const MISSING_TOKEN: &str = "M";

/// Classifies one assessment cell of a due column.
pub fn interpret_cell(value: &CellValue, stray_text: StrayTextPolicy) -> CellStatus {
    match value {
        CellValue::Empty => CellStatus::NotSubmitted,
        CellValue::Number(_) | CellValue::Date(_) => CellStatus::Submitted,
        CellValue::Text(raw) => interpret_text(raw, stray_text),
    }
}

fn interpret_text(raw: &str, stray_text: StrayTextPolicy) -> CellStatus {
    let token = raw.trim().to_uppercase();
    if token.is_empty() || token == "-" || token == MISSING_TOKEN {
        return CellStatus::NotSubmitted;
    }
    if IGNORED_TOKENS.contains(&token.as_str()) {
        return CellStatus::Ignored;
    }
    if token.replace(',', ".").trim_end_matches('%').parse::<f64>().is_ok() {
        return CellStatus::Submitted;
    }
    match stray_text {
        StrayTextPolicy::Submitted => CellStatus::Submitted,
        StrayTextPolicy::NotSubmitted => CellStatus::NotSubmitted,
    }
}
