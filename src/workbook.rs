use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

use crate::models::{CellValue, Sheet, Workbook};

/// Converts a calamine cell. Typed date cells become dates, everything
/// textual is trimmed, errors read as blank.
pub fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => CellValue::Date(datetime.date()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => {
            match chrono::NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d") {
                Ok(date) => CellValue::Date(date),
                Err(_) => CellValue::text(s),
            }
        }
        Data::DurationIso(s) => CellValue::text(s),
    }
}

/// Loads every worksheet of an `.xlsx`, `.xls` or `.ods` file. Rows are
/// anchored at A1 even when the used range starts further in.
pub fn load_workbook(path: &Path) -> anyhow::Result<Workbook> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(err) => {
                warn!(sheet = %name, error = %err, "unreadable worksheet");
                continue;
            }
        };

        let (row_offset, col_offset) = range
            .start()
            .map(|(row, col)| (row as usize, col as usize))
            .unwrap_or((0, 0));

        let mut rows = vec![Vec::new(); row_offset];
        for data_row in range.rows() {
            let mut row = vec![CellValue::Empty; col_offset];
            row.extend(data_row.iter().map(convert_cell));
            rows.push(row);
        }
        debug!(sheet = %name, rows = rows.len(), "loaded worksheet");
        sheets.push(Sheet { name, rows });
    }

    Ok(Workbook { sheets })
}
