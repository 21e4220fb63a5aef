//! In-memory Drive + Sheets backend for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use gdrive_core::a1;
use gdrive_core::error::ConnectorError;
use gdrive_core::google::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct State {
    pub files: Vec<(DriveFile, Vec<u8>)>,
    pub list_requests: Vec<ListFilesRequest>,
    pub value_requests: Vec<(String, ValueRenderOption, DateTimeRenderOption)>,
    pub exports: Vec<(String, String)>,
    pub grids: HashMap<String, Vec<Vec<Value>>>,
    pub titles: HashMap<String, String>,
    pub metadata: HashMap<String, Vec<DeveloperMetadata>>,
    pub batches: HashMap<String, Vec<Vec<Value>>>,
    pub next_id: u32,
    pub fail_batch_update: bool,
}

#[derive(Default)]
pub struct FakeGoogle {
    pub state: Mutex<State>,
}

impl FakeGoogle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, id: &str, name: &str, mime: &str, parent: Option<&str>, body: &[u8]) {
        let file = DriveFile {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            mime_type: Some(mime.to_string()),
            size: Some(body.len().to_string()),
            parents: parent.map(|p| vec![p.to_string()]),
            web_view_link: Some(format!("https://drive.google.com/file/d/{}/view", id)),
            ..Default::default()
        };
        self.state.lock().unwrap().files.push((file, body.to_vec()));
    }

    pub fn add_sheet(&self, id: &str, title: &str, rows: Value) {
        let grid: Vec<Vec<Value>> = serde_json::from_value(rows).unwrap();
        let mut state = self.state.lock().unwrap();
        state.grids.insert(id.to_string(), grid);
        state.titles.insert(id.to_string(), title.to_string());
    }

    pub fn grid(&self, id: &str) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .unwrap()
            .grids
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_layout(&self) {
        self.state.lock().unwrap().fail_batch_update = true;
    }
}

fn not_found(what: &str) -> ConnectorError {
    ConnectorError::Api {
        status: 404,
        message: format!("Requested entity was not found: {}", what),
    }
}

fn sheet_cells(range: &str) -> &str {
    range.rsplit_once('!').map_or(range, |(_, cells)| cells)
}

/// (row0, col0, row_end exclusive, col_end exclusive) for ranges like
/// `A1:Z10`, `A:G`, `B2` or `Sheet1!B2:B2`.
fn bounds(range: &str) -> (usize, usize, usize, usize) {
    let cells = sheet_cells(range);
    let mut parts = cells.split(':');
    let start = parts.next().unwrap_or("A1");
    let end = parts.next().unwrap_or(start);
    let corner = |cell: &str, default_row: usize| -> (usize, usize) {
        let split = cell
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(cell.len());
        let (letters, digits) = cell.split_at(split);
        let col = a1::column_index(letters).unwrap() as usize;
        let row = digits.parse::<usize>().map(|r| r - 1).unwrap_or(default_row);
        (row, col)
    };
    let (r0, c0) = corner(start, 0);
    let (r1, c1) = corner(end, usize::MAX - 1);
    (r0, c0, r1 + 1, c1 + 1)
}

fn trim_grid(mut grid: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    for row in grid.iter_mut() {
        while matches!(row.last(), Some(v) if v.is_null() || v == "") {
            row.pop();
        }
    }
    while matches!(grid.last(), Some(r) if r.is_empty()) {
        grid.pop();
    }
    grid
}

fn write_cells(grid: &mut Vec<Vec<Value>>, row0: usize, col0: usize, values: &[Vec<Value>]) {
    for (i, row) in values.iter().enumerate() {
        let r = row0 + i;
        if grid.len() <= r {
            grid.resize(r + 1, Vec::new());
        }
        for (j, v) in row.iter().enumerate() {
            let c = col0 + j;
            if grid[r].len() <= c {
                grid[r].resize(c + 1, Value::String(String::new()));
            }
            grid[r][c] = v.clone();
        }
    }
}

#[async_trait]
impl DriveApi for FakeGoogle {
    async fn list_files(&self, request: &ListFilesRequest) -> Result<FileList, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        state.list_requests.push(request.clone());
        let folder = request
            .q
            .strip_prefix('\'')
            .and_then(|rest| rest.split_once("' in parents"))
            .map(|(f, _)| f.to_string());
        let matching: Vec<DriveFile> = state
            .files
            .iter()
            .map(|(f, _)| f.clone())
            .filter(|f| match &folder {
                Some(folder) => f.parents.as_ref().is_some_and(|p| p.contains(folder)),
                None => true,
            })
            .collect();
        let offset: usize = request
            .page_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let end = (offset + request.page_size as usize).min(matching.len());
        let next_page_token = (end < matching.len()).then(|| end.to_string());
        Ok(FileList {
            files: matching[offset.min(end)..end].to_vec(),
            next_page_token,
        })
    }

    async fn get_file(&self, file_id: &str, _fields: &str) -> Result<DriveFile, ConnectorError> {
        let state = self.state.lock().unwrap();
        state
            .files
            .iter()
            .find(|(f, _)| f.id.as_deref() == Some(file_id))
            .map(|(f, _)| f.clone())
            .ok_or_else(|| not_found(file_id))
    }

    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        state
            .exports
            .push((file_id.to_string(), mime_type.to_string()));
        state
            .files
            .iter()
            .find(|(f, _)| f.id.as_deref() == Some(file_id))
            .map(|(_, b)| b.clone())
            .ok_or_else(|| not_found(file_id))
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ConnectorError> {
        let state = self.state.lock().unwrap();
        state
            .files
            .iter()
            .find(|(f, _)| f.id.as_deref() == Some(file_id))
            .map(|(_, b)| b.clone())
            .ok_or_else(|| not_found(file_id))
    }

    async fn create_file(&self, metadata: &DriveFile) -> Result<DriveFile, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("sheet-{}", state.next_id);
        let mut file = metadata.clone();
        file.id = Some(id.clone());
        file.web_view_link = Some(format!("https://docs.google.com/spreadsheets/d/{}/edit", id));
        state.files.push((file.clone(), Vec::new()));
        state.grids.insert(id.clone(), Vec::new());
        state
            .titles
            .insert(id, metadata.name.clone().unwrap_or_default());
        Ok(file)
    }
}

#[async_trait]
impl SheetsApi for FakeGoogle {
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
        date_time: DateTimeRenderOption,
    ) -> Result<ValueRange, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        state
            .value_requests
            .push((range.to_string(), render, date_time));
        let grid = state
            .grids
            .get(spreadsheet_id)
            .ok_or_else(|| not_found(spreadsheet_id))?;
        let (r0, c0, r1, c1) = bounds(range);
        let values = grid
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= r0 && *i < r1)
            .map(|(_, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(j, _)| *j >= c0 && *j < c1)
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .collect();
        Ok(ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".into()),
            values: trim_grid(values),
        })
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        _input: ValueInputOption,
    ) -> Result<UpdateValuesResponse, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        let grid = state
            .grids
            .get_mut(spreadsheet_id)
            .ok_or_else(|| not_found(spreadsheet_id))?;
        let (r0, c0, _, _) = bounds(range);
        write_cells(grid, r0, c0, &values);
        let columns = values.iter().map(Vec::len).max().unwrap_or(0);
        Ok(UpdateValuesResponse {
            spreadsheet_id: Some(spreadsheet_id.to_string()),
            updated_range: Some(format!("Sheet1!{}", sheet_cells(range))),
            updated_rows: values.len() as u64,
            updated_columns: columns as u64,
            updated_cells: values.iter().map(|r| r.len() as u64).sum(),
        })
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        _input: ValueInputOption,
    ) -> Result<AppendValuesResponse, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        let grid = state
            .grids
            .get_mut(spreadsheet_id)
            .ok_or_else(|| not_found(spreadsheet_id))?;
        let (_, c0, _, _) = bounds(range);
        let first = trim_grid(grid.clone()).len();
        write_cells(grid, first, c0, &values);
        let last = first + values.len();
        Ok(AppendValuesResponse {
            table_range: None,
            updates: Some(UpdateValuesResponse {
                spreadsheet_id: Some(spreadsheet_id.to_string()),
                updated_range: Some(format!("Sheet1!A{}:G{}", first + 1, last)),
                updated_rows: values.len() as u64,
                updated_columns: 7,
                updated_cells: values.iter().map(|r| r.len() as u64).sum(),
            }),
        })
    }

    async fn get_spreadsheet(
        &self,
        spreadsheet_id: &str,
        _fields: &str,
    ) -> Result<Spreadsheet, ConnectorError> {
        let state = self.state.lock().unwrap();
        let title = state
            .titles
            .get(spreadsheet_id)
            .ok_or_else(|| not_found(spreadsheet_id))?;
        Ok(Spreadsheet {
            spreadsheet_id: Some(spreadsheet_id.to_string()),
            properties: Some(SpreadsheetProperties {
                title: Some(title.clone()),
            }),
            ..Default::default()
        })
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<BatchUpdateResponse, ConnectorError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_batch_update {
            return Err(ConnectorError::Api {
                status: 400,
                message: "Invalid requests[2].setDataValidation".into(),
            });
        }
        if !state.grids.contains_key(spreadsheet_id) {
            return Err(not_found(spreadsheet_id));
        }
        state
            .batches
            .entry(spreadsheet_id.to_string())
            .or_default()
            .push(requests.clone());

        let mut replies = Vec::new();
        for request in requests {
            if let Some(update) = request.get("updateCells") {
                let row: Vec<Value> = update["rows"][0]["values"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|cell| cell["userEnteredValue"]["stringValue"].clone())
                    .collect();
                let grid = state.grids.entry(spreadsheet_id.to_string()).or_default();
                write_cells(grid, 0, 0, &[row]);
                replies.push(json!({}));
            } else if let Some(create) = request.get("createDeveloperMetadata") {
                let mut md: DeveloperMetadata =
                    serde_json::from_value(create["developerMetadata"].clone())?;
                state.next_id += 1;
                md.metadata_id = Some(state.next_id as i64);
                replies.push(json!({ "createDeveloperMetadata": { "developerMetadata": md } }));
                state
                    .metadata
                    .entry(spreadsheet_id.to_string())
                    .or_default()
                    .push(md);
            } else {
                replies.push(json!({}));
            }
        }
        Ok(BatchUpdateResponse {
            spreadsheet_id: Some(spreadsheet_id.to_string()),
            replies,
        })
    }

    async fn search_developer_metadata(
        &self,
        spreadsheet_id: &str,
        data_filters: Vec<Value>,
    ) -> Result<SearchDeveloperMetadataResponse, ConnectorError> {
        let state = self.state.lock().unwrap();
        let entries = state
            .metadata
            .get(spreadsheet_id)
            .cloned()
            .unwrap_or_default();
        let location_type = |md: &DeveloperMetadata| -> &'static str {
            match &md.location {
                Some(loc) if loc.get("sheetId").is_some() => "SHEET",
                _ => "SPREADSHEET",
            }
        };
        let matched = entries
            .into_iter()
            .filter(|md| {
                data_filters.iter().any(|f| {
                    let lookup = &f["developerMetadataLookup"];
                    match (lookup.get("metadataKey"), lookup.get("locationType")) {
                        (Some(key), _) => md.metadata_key.as_deref() == key.as_str(),
                        (None, Some(loc)) => loc.as_str() == Some(location_type(md)),
                        _ => false,
                    }
                })
            })
            .map(|md| MatchedDeveloperMetadata {
                developer_metadata: Some(md),
            })
            .collect();
        Ok(SearchDeveloperMetadataResponse {
            matched_developer_metadata: matched,
        })
    }
}
