pub mod layout;
pub mod summary;

use async_trait::async_trait;
use rmcp::model::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::a1;
use crate::error::ConnectorError;
use crate::google::{
    DateTimeRenderOption, DeveloperMetadata, DriveApi, DriveFile, SheetsApi, ValueInputOption,
    ValueRenderOption, SPREADSHEET_MIME_TYPE,
};
use crate::utils::{structured_error_result, structured_result_with_text};
use crate::Connector;
use layout::{MetadataLocation, DEFAULT_CATEGORIES, DEFAULT_HEADERS};
use summary::DateRange;

/// Columns written by `append_expense_row` and read by the summary.
const EXPENSE_RANGE: &str = "A:G";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateExpenseSheetInput {
    /// Name of the new spreadsheet.
    pub name: String,
    /// Parent folder. Defaults to the configured folder.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Allowed values for the Category dropdown.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Header row. Defaults to Date, Description, Category, Amount, Payment Method, Notes, Tags.
    #[serde(default)]
    pub initial_headers: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadCellsInput {
    pub spreadsheet_id: String,
    /// A1 range, e.g. `A1:D10` or `Sheet1!A:A`.
    #[serde(default = "default_read_range")]
    #[schemars(default = "default_read_range")]
    pub range_notation: String,
}

fn default_read_range() -> String {
    "A1:Z1000".to_string()
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateCellsInput {
    pub spreadsheet_id: String,
    /// A1 range to overwrite, e.g. `A2:D2`.
    pub range_notation: String,
    /// Rows of scalar cell values (strings, numbers, booleans or null).
    pub values: Vec<Vec<Value>>,
    /// `USER_ENTERED` parses input like the UI does; `RAW` stores it verbatim.
    #[serde(default = "default_input_option")]
    #[schemars(default = "default_input_option")]
    pub value_input_option: String,
}

fn default_input_option() -> String {
    "USER_ENTERED".to_string()
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AppendExpenseInput {
    pub spreadsheet_id: String,
    /// Expense date, YYYY-MM-DD.
    pub date: String,
    pub description: String,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Comma-separated tags.
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetMetadataInput {
    pub spreadsheet_id: String,
    pub key: String,
    pub value: String,
    /// `spreadsheet` or `sheet`.
    #[serde(default = "default_location_type")]
    #[schemars(default = "default_location_type")]
    pub location_type: String,
    /// Sheet the entry is attached to when location_type is `sheet`.
    #[serde(default)]
    pub sheet_id: i64,
}

fn default_location_type() -> String {
    "spreadsheet".to_string()
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetMetadataInput {
    pub spreadsheet_id: String,
    /// Only entries with exactly this key. All entries when omitted.
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CategoryValidationInput {
    pub spreadsheet_id: String,
    /// Column letters, e.g. `C` or `AB`.
    pub column: String,
    pub categories: Vec<String>,
    /// First row (1-based) that gets the dropdown.
    #[serde(default = "default_start_row")]
    #[schemars(default = "default_start_row")]
    pub start_row: u32,
    #[serde(default)]
    pub sheet_id: i64,
}

fn default_start_row() -> u32 {
    2
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExpenseSummaryInput {
    pub spreadsheet_id: String,
    /// Inclusive filter, `YYYY-MM-DD:YYYY-MM-DD`.
    #[serde(default)]
    pub date_range: Option<String>,
}

/// Expense-tracking operations on Google Sheets.
pub struct SheetsConnector {
    sheets: Arc<dyn SheetsApi>,
    drive: Arc<dyn DriveApi>,
    folder_id: Option<String>,
}

impl SheetsConnector {
    pub fn new(
        sheets: Arc<dyn SheetsApi>,
        drive: Arc<dyn DriveApi>,
        folder_id: Option<String>,
    ) -> Self {
        Self {
            sheets,
            drive,
            folder_id: folder_id.filter(|f| !f.trim().is_empty()),
        }
    }

    async fn create_expense_sheet(
        &self,
        input: CreateExpenseSheetInput,
    ) -> Result<CallToolResult, ConnectorError> {
        let headers = input
            .initial_headers
            .unwrap_or_else(|| DEFAULT_HEADERS.iter().map(|s| s.to_string()).collect());
        let categories = input
            .categories
            .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect());
        let requests = layout::expense_sheet_requests(&headers, &categories)?;

        let parent = input
            .folder_id
            .filter(|f| !f.trim().is_empty())
            .or_else(|| self.folder_id.clone());
        let metadata = DriveFile {
            name: Some(input.name.clone()),
            mime_type: Some(SPREADSHEET_MIME_TYPE.to_string()),
            parents: parent.map(|p| vec![p]),
            ..Default::default()
        };
        let created = self.drive.create_file(&metadata).await?;
        let spreadsheet_id = created.id.ok_or_else(|| {
            ConnectorError::Other("Drive did not return an id for the new spreadsheet".into())
        })?;
        info!(spreadsheet_id = %spreadsheet_id, "Created spreadsheet");

        let sheet = json!({
            "id": spreadsheet_id,
            "name": input.name,
            "webViewLink": created.web_view_link,
        });
        if let Err(e) = self.sheets.batch_update(&spreadsheet_id, requests).await {
            error!(spreadsheet_id = %spreadsheet_id, error = %e, "Expense layout failed");
            let mut body = e.to_tool_error();
            body["failed_step"] = json!("apply_layout");
            body["sheet"] = sheet;
            return Ok(structured_error_result(body));
        }

        let mut sheet = sheet;
        sheet["headers"] = json!(headers);
        sheet["categories"] = json!(categories);
        sheet["setup_complete"] = json!(true);
        let body = json!({ "success": true, "sheet": sheet });
        structured_result_with_text(&body, None)
    }

    async fn read_cells(&self, input: ReadCellsInput) -> Result<CallToolResult, ConnectorError> {
        let values = self
            .sheets
            .get_values(
                &input.spreadsheet_id,
                &input.range_notation,
                ValueRenderOption::Unformatted,
                DateTimeRenderOption::FormattedString,
            )
            .await?
            .values;
        let spreadsheet = self
            .sheets
            .get_spreadsheet(&input.spreadsheet_id, "properties.title")
            .await?;
        let columns = values.iter().map(Vec::len).max().unwrap_or(0);
        let body = json!({
            "spreadsheet_id": input.spreadsheet_id,
            "spreadsheet_title": spreadsheet.title(),
            "range": input.range_notation,
            "rows": values.len(),
            "columns": columns,
            "values": values,
        });
        structured_result_with_text(&body, None)
    }

    async fn update_cells(&self, input: UpdateCellsInput) -> Result<CallToolResult, ConnectorError> {
        let option = ValueInputOption::parse(&input.value_input_option).ok_or_else(|| {
            ConnectorError::InvalidParams(format!(
                "value_input_option must be USER_ENTERED or RAW, got '{}'",
                input.value_input_option
            ))
        })?;
        if input
            .values
            .iter()
            .flatten()
            .any(|v| v.is_object() || v.is_array())
        {
            return Err(ConnectorError::InvalidParams(
                "values must be rows of strings, numbers, booleans or null".to_string(),
            ));
        }
        let res = self
            .sheets
            .update_values(
                &input.spreadsheet_id,
                &input.range_notation,
                input.values,
                option,
            )
            .await?;
        let body = json!({
            "success": true,
            "updated_cells": res.updated_cells,
            "updated_rows": res.updated_rows,
            "updated_columns": res.updated_columns,
            "updated_range": res.updated_range.unwrap_or_default(),
        });
        structured_result_with_text(&body, None)
    }

    async fn append_expense(
        &self,
        input: AppendExpenseInput,
    ) -> Result<CallToolResult, ConnectorError> {
        if !input.amount.is_finite() {
            return Err(ConnectorError::InvalidParams(
                "amount must be a finite number".to_string(),
            ));
        }
        let row = vec![
            json!(input.date),
            json!(input.description),
            json!(input.category),
            json!(input.amount),
            json!(input.payment_method.clone().unwrap_or_default()),
            json!(input.notes.clone().unwrap_or_default()),
            json!(input.tags.clone().unwrap_or_default()),
        ];
        let res = self
            .sheets
            .append_values(
                &input.spreadsheet_id,
                EXPENSE_RANGE,
                vec![row],
                ValueInputOption::UserEntered,
            )
            .await?;
        let updates = res.updates.unwrap_or_default();
        let body = json!({
            "success": true,
            "updated_range": updates.updated_range.unwrap_or_default(),
            "updated_rows": updates.updated_rows,
            "expense": {
                "date": input.date,
                "description": input.description,
                "category": input.category,
                "amount": input.amount,
                "payment_method": input.payment_method,
                "notes": input.notes,
                "tags": input.tags,
            },
        });
        structured_result_with_text(&body, None)
    }

    async fn set_metadata(&self, input: SetMetadataInput) -> Result<CallToolResult, ConnectorError> {
        let location = MetadataLocation::parse(&input.location_type, input.sheet_id)?;
        if input.key.trim().is_empty() {
            return Err(ConnectorError::InvalidParams("key must not be empty".to_string()));
        }
        let request = layout::create_metadata(&input.key, &input.value, location);
        let res = self
            .sheets
            .batch_update(&input.spreadsheet_id, vec![request])
            .await?;
        let metadata_id = res
            .replies
            .first()
            .and_then(|r| r.pointer("/createDeveloperMetadata/developerMetadata/metadataId"))
            .cloned()
            .unwrap_or(Value::Null);
        let body = json!({
            "success": true,
            "metadata_id": metadata_id,
            "metadata_key": input.key,
            "metadata_value": input.value,
            "location_type": location.label(),
        });
        structured_result_with_text(&body, None)
    }

    async fn get_metadata(&self, input: GetMetadataInput) -> Result<CallToolResult, ConnectorError> {
        let key = input.key.as_deref().filter(|k| !k.is_empty());
        let res = self
            .sheets
            .search_developer_metadata(&input.spreadsheet_id, layout::metadata_filters(key))
            .await?;
        let metadata: Vec<Value> = res
            .matched_developer_metadata
            .into_iter()
            .filter_map(|m| m.developer_metadata)
            .map(metadata_entry)
            .collect();
        let body = json!({
            "spreadsheet_id": input.spreadsheet_id,
            "count": metadata.len(),
            "metadata": metadata,
        });
        structured_result_with_text(&body, None)
    }

    async fn add_category_validation(
        &self,
        input: CategoryValidationInput,
    ) -> Result<CallToolResult, ConnectorError> {
        let column_index = a1::column_index(&input.column)?;
        if input.categories.is_empty() {
            return Err(ConnectorError::InvalidParams(
                "categories must not be empty".to_string(),
            ));
        }
        if input.start_row == 0 {
            return Err(ConnectorError::InvalidParams(
                "start_row is 1-based and must be at least 1".to_string(),
            ));
        }
        let request = layout::category_validation(
            input.sheet_id,
            column_index,
            input.start_row - 1,
            &input.categories,
        );
        self.sheets
            .batch_update(&input.spreadsheet_id, vec![request])
            .await?;
        let column = a1::column_letter(column_index);
        let body = json!({
            "success": true,
            "range": a1::open_column_range(&column, input.start_row),
            "column": column,
            "categories": input.categories,
            "start_row": input.start_row,
        });
        structured_result_with_text(&body, None)
    }

    async fn expense_summary(
        &self,
        input: ExpenseSummaryInput,
    ) -> Result<CallToolResult, ConnectorError> {
        let range = input
            .date_range
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(DateRange::parse)
            .transpose()?;
        let values = self
            .sheets
            .get_values(
                &input.spreadsheet_id,
                EXPENSE_RANGE,
                ValueRenderOption::Unformatted,
                DateTimeRenderOption::SerialNumber,
            )
            .await?
            .values;
        let summary = summary::summarize(&values, range.as_ref());
        if summary.skipped_rows > 0 {
            warn!(
                spreadsheet_id = %input.spreadsheet_id,
                skipped = summary.skipped_rows,
                "Rows skipped in expense summary"
            );
        }
        let text = format!(
            "{:.2} across {} expenses in {} categories",
            summary.total,
            summary.count,
            summary.categories.len()
        );
        let body = json!({
            "spreadsheet_id": input.spreadsheet_id,
            "total": summary.total,
            "count": summary.count,
            "categories": summary.categories,
            "skipped_rows": summary.skipped_rows,
            "date_range": input.date_range,
        });
        structured_result_with_text(&body, Some(text))
    }
}

fn metadata_entry(md: DeveloperMetadata) -> Value {
    json!({
        "id": md.metadata_id,
        "key": md.metadata_key,
        "value": md.metadata_value,
        "location": md.location.unwrap_or_else(|| json!({})),
    })
}

fn parse_args<T: serde::de::DeserializeOwned>(
    args: Option<serde_json::Map<String, Value>>,
) -> Result<T, ConnectorError> {
    serde_json::from_value(Value::Object(args.unwrap_or_default()))
        .map_err(|e| ConnectorError::InvalidParams(e.to_string()))
}

fn tool<T: JsonSchema>(name: &'static str, description: &'static str) -> Result<Tool, ConnectorError> {
    Ok(Tool {
        name: Cow::Borrowed(name),
        title: None,
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(
            serde_json::to_value(schemars::schema_for!(T))
                .map_err(|e| ConnectorError::Other(e.to_string()))?
                .as_object()
                .expect("Schema object")
                .clone(),
        ),
        output_schema: None,
        annotations: None,
        icons: None,
    })
}

#[async_trait]
impl Connector for SheetsConnector {
    fn name(&self) -> &'static str {
        "sheets"
    }

    fn description(&self) -> &'static str {
        "Google Sheets expense tracking: create formatted sheets, read/write cells, append expenses, developer metadata and summaries."
    }

    async fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(Default::default()),
            ..Default::default()
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
    ) -> Result<InitializeResult, ConnectorError> {
        Ok(InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: self.capabilities().await,
            server_info: Implementation {
                name: self.name().to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Expense sheets use the columns Date, Description, Category, Amount, Payment Method, Notes, Tags on the first sheet."
                    .to_string(),
            ),
        })
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListResourcesResult, ConnectorError> {
        Ok(ListResourcesResult {
            resources: vec![],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        _request: ReadResourceRequestParam,
    ) -> Result<Vec<ResourceContents>, ConnectorError> {
        Err(ConnectorError::ResourceNotFound)
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, ConnectorError> {
        let tools = vec![
            tool::<CreateExpenseSheetInput>(
                "create_expense_sheet",
                "Create a spreadsheet laid out for expense tracking: bold header row, Category dropdown, currency and date formats, frozen header.",
            )?,
            tool::<ReadCellsInput>(
                "read_sheet_cells",
                "Read a range of cells (A1 notation) with the spreadsheet title and grid dimensions.",
            )?,
            tool::<UpdateCellsInput>(
                "update_sheet_cells",
                "Overwrite a range of cells with a 2-D array of values.",
            )?,
            tool::<AppendExpenseInput>(
                "append_expense_row",
                "Append one expense row (Date, Description, Category, Amount, Payment Method, Notes, Tags) below the existing data.",
            )?,
            tool::<SetMetadataInput>(
                "set_sheet_metadata",
                "Attach a key/value developer metadata entry to the spreadsheet or one of its sheets.",
            )?,
            tool::<GetMetadataInput>(
                "get_sheet_metadata",
                "List developer metadata entries, optionally only those with a given key.",
            )?,
            tool::<CategoryValidationInput>(
                "add_category_validation",
                "Restrict a column to a dropdown of categories from start_row down.",
            )?,
            tool::<ExpenseSummaryInput>(
                "get_expense_summary",
                "Total expenses overall and per category, optionally within an inclusive date range.",
            )?,
        ];

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, ConnectorError> {
        let name = request.name.as_ref();
        info!(tool = name, "sheets tool call");
        match name {
            "create_expense_sheet" => self.create_expense_sheet(parse_args(request.arguments)?).await,
            "read_sheet_cells" => self.read_cells(parse_args(request.arguments)?).await,
            "update_sheet_cells" => self.update_cells(parse_args(request.arguments)?).await,
            "append_expense_row" => self.append_expense(parse_args(request.arguments)?).await,
            "set_sheet_metadata" => self.set_metadata(parse_args(request.arguments)?).await,
            "get_sheet_metadata" => self.get_metadata(parse_args(request.arguments)?).await,
            "add_category_validation" => {
                self.add_category_validation(parse_args(request.arguments)?)
                    .await
            }
            "get_expense_summary" => self.expense_summary(parse_args(request.arguments)?).await,
            _ => Err(ConnectorError::ToolNotFound),
        }
    }
}
