//! Export Adapter: CSV and JSON renderings of result rows.
//!
//! CSV quoting is deliberately narrow: a string value containing a comma is
//! wrapped in double quotes, and nothing else is escaped. Embedded quotes and
//! newlines pass through as-is, so values holding them produce files that
//! strict CSV readers will misparse.

use serde_json::Value;

use crate::error::ExportError;
use crate::filter::scalar_text;
use crate::page::Row;

/// Render rows as CSV.
///
/// The header is the key order of the first row. Later rows are written in
/// that order; keys they lack render as empty cells and keys the first row
/// lacks are dropped. Lines are joined with `\n`, with no trailing newline.
pub fn to_csv(rows: &[Row]) -> Result<String, ExportError> {
    let first = rows.first().ok_or(ExportError::NothingToExport)?;
    let headers: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.iter().map(|h| h.as_str()).collect::<Vec<_>>().join(","));

    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h.as_str()).map(csv_cell).unwrap_or_default())
            .collect();
        lines.push(cells.join(","));
    }

    Ok(lines.join("\n"))
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(',') => format!("\"{}\"", s),
        other => scalar_text(other),
    }
}

/// Render rows as a pretty-printed JSON array, keeping field order.
pub fn to_json(rows: &[Row]) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}
