//! A1 notation helpers.
//!
//! Ranges are validated by the Sheets API, not here. These helpers only cover
//! what the adapter has to compute itself: column indices and labels for
//! validation ranges.

use crate::error::ConnectorError;

/// Zero-based column index for a column label: `A` → 0, `Z` → 25, `AA` → 26.
pub fn column_index(column: &str) -> Result<u32, ConnectorError> {
    let label = column.trim();
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConnectorError::InvalidParams(format!(
            "column must be letters like 'C' or 'AB', got '{}'",
            column
        )));
    }
    // Sheets caps at 18278 columns (ZZZ).
    if label.len() > 3 {
        return Err(ConnectorError::InvalidParams(format!(
            "column '{}' is out of range",
            column
        )));
    }
    let mut index: u32 = 0;
    for c in label.chars() {
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        index = index * 26 + digit;
    }
    Ok(index - 1)
}

/// Column label for a zero-based index: 0 → `A`, 27 → `AB`.
pub fn column_letter(mut index: u32) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.iter().rev().collect()
}

/// Open-ended column range starting at `start_row` (1-based): `C2:C`.
pub fn open_column_range(column: &str, start_row: u32) -> String {
    let label = column.trim().to_ascii_uppercase();
    format!("{}{}:{}", label, start_row, label)
}
