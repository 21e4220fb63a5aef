//! `batchUpdate` request bodies for the expense-sheet layout.

use serde_json::{json, Value};

use crate::error::ConnectorError;

/// A spreadsheet created through Drive gets one sheet, and its id is 0.
pub const FIRST_SHEET_ID: i64 = 0;

/// Developer metadata written by this server is only visible to its own
/// Cloud project.
pub const METADATA_VISIBILITY: &str = "PROJECT";

pub const DEFAULT_HEADERS: [&str; 7] = [
    "Date",
    "Description",
    "Category",
    "Amount",
    "Payment Method",
    "Notes",
    "Tags",
];

pub const DEFAULT_CATEGORIES: [&str; 10] = [
    "Food & Dining",
    "Transportation",
    "Shopping",
    "Bills & Utilities",
    "Healthcare",
    "Entertainment",
    "Travel",
    "Education",
    "Personal Care",
    "Other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLocation {
    Spreadsheet,
    Sheet(i64),
}

impl MetadataLocation {
    pub fn parse(location_type: &str, sheet_id: i64) -> Result<Self, ConnectorError> {
        match location_type.trim().to_ascii_lowercase().as_str() {
            "spreadsheet" => Ok(MetadataLocation::Spreadsheet),
            "sheet" => Ok(MetadataLocation::Sheet(sheet_id)),
            other => Err(ConnectorError::InvalidParams(format!(
                "location_type must be 'spreadsheet' or 'sheet', got '{}'",
                other
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetadataLocation::Spreadsheet => "spreadsheet",
            MetadataLocation::Sheet(_) => "sheet",
        }
    }

    fn to_json(self) -> Value {
        match self {
            MetadataLocation::Spreadsheet => json!({ "spreadsheet": true }),
            MetadataLocation::Sheet(id) => json!({ "sheetId": id }),
        }
    }
}

pub fn write_header_row(sheet_id: i64, headers: &[String]) -> Value {
    let cells: Vec<Value> = headers
        .iter()
        .map(|h| json!({ "userEnteredValue": { "stringValue": h } }))
        .collect();
    json!({
        "updateCells": {
            "rows": [{ "values": cells }],
            "fields": "userEnteredValue",
            "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0 }
        }
    })
}

/// Dark background, white bold text on row 1.
pub fn format_header_row(sheet_id: i64) -> Value {
    json!({
        "repeatCell": {
            "range": { "sheetId": sheet_id, "startRowIndex": 0, "endRowIndex": 1 },
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": { "red": 0.2, "green": 0.2, "blue": 0.2 },
                    "textFormat": {
                        "foregroundColor": { "red": 1.0, "green": 1.0, "blue": 1.0 },
                        "bold": true
                    }
                }
            },
            "fields": "userEnteredFormat(backgroundColor,textFormat)"
        }
    })
}

/// Dropdown restricted to `categories` on one column from `start_row_index`
/// (zero-based) down. Replaces any rule already on that range.
pub fn category_validation(
    sheet_id: i64,
    column_index: u32,
    start_row_index: u32,
    categories: &[String],
) -> Value {
    let values: Vec<Value> = categories
        .iter()
        .map(|c| json!({ "userEnteredValue": c }))
        .collect();
    json!({
        "setDataValidation": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": start_row_index,
                "startColumnIndex": column_index,
                "endColumnIndex": column_index + 1
            },
            "rule": {
                "condition": { "type": "ONE_OF_LIST", "values": values },
                "showCustomUi": true,
                "strict": true
            }
        }
    })
}

fn column_number_format(sheet_id: i64, column_index: u32, kind: &str, pattern: &str) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": 1,
                "startColumnIndex": column_index,
                "endColumnIndex": column_index + 1
            },
            "cell": {
                "userEnteredFormat": {
                    "numberFormat": { "type": kind, "pattern": pattern }
                }
            },
            "fields": "userEnteredFormat.numberFormat"
        }
    })
}

pub fn currency_format(sheet_id: i64, column_index: u32) -> Value {
    column_number_format(sheet_id, column_index, "CURRENCY", "$#,##0.00")
}

pub fn date_format(sheet_id: i64, column_index: u32) -> Value {
    column_number_format(sheet_id, column_index, "DATE", "yyyy-mm-dd")
}

pub fn freeze_header_row(sheet_id: i64) -> Value {
    json!({
        "updateSheetProperties": {
            "properties": {
                "sheetId": sheet_id,
                "gridProperties": { "frozenRowCount": 1 }
            },
            "fields": "gridProperties.frozenRowCount"
        }
    })
}

pub fn auto_resize_columns(sheet_id: i64, count: usize) -> Value {
    json!({
        "autoResizeDimensions": {
            "dimensions": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": 0,
                "endIndex": count
            }
        }
    })
}

pub fn create_metadata(key: &str, value: &str, location: MetadataLocation) -> Value {
    json!({
        "createDeveloperMetadata": {
            "developerMetadata": {
                "metadataKey": key,
                "metadataValue": value,
                "location": location.to_json(),
                "visibility": METADATA_VISIBILITY
            }
        }
    })
}

/// Search filters matching one key anywhere in the spreadsheet, or every
/// entry when `key` is `None`.
pub fn metadata_filters(key: Option<&str>) -> Vec<Value> {
    match key {
        Some(key) => vec![json!({ "developerMetadataLookup": { "metadataKey": key } })],
        None => ["SPREADSHEET", "SHEET", "ROW", "COLUMN"]
            .iter()
            .map(|loc| json!({ "developerMetadataLookup": { "locationType": loc } }))
            .collect(),
    }
}

fn column_of(headers: &[String], name: &str) -> Option<u32> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .map(|i| i as u32)
}

/// Everything applied to a fresh expense sheet, in application order.
pub fn expense_sheet_requests(
    headers: &[String],
    categories: &[String],
) -> Result<Vec<Value>, ConnectorError> {
    if headers.is_empty() {
        return Err(ConnectorError::InvalidParams(
            "initial_headers must not be empty".to_string(),
        ));
    }
    if categories.is_empty() {
        return Err(ConnectorError::InvalidParams(
            "categories must not be empty".to_string(),
        ));
    }
    let sheet = FIRST_SHEET_ID;
    let mut requests = vec![write_header_row(sheet, headers), format_header_row(sheet)];
    if let Some(col) = column_of(headers, "Category") {
        requests.push(category_validation(sheet, col, 1, categories));
    }
    if let Some(col) = column_of(headers, "Amount") {
        requests.push(currency_format(sheet, col));
    }
    if let Some(col) = column_of(headers, "Date") {
        requests.push(date_format(sheet, col));
    }
    requests.push(freeze_header_row(sheet));
    requests.push(auto_resize_columns(sheet, headers.len()));
    requests.push(create_metadata(
        "sheet_type",
        "expense_tracker",
        MetadataLocation::Spreadsheet,
    ));
    requests.push(create_metadata(
        "expense_categories",
        &serde_json::to_string(categories)?,
        MetadataLocation::Spreadsheet,
    ));
    Ok(requests)
}
