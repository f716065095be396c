//! Script results
//!
//! An action ends with exactly one [`ActionOutcome`]; everything else it wants
//! to show (JSON, tables, links, attachments) goes to a [`ResultSink`].

use std::fmt::Display;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::alert::AlertInfo;

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Completed,
    InProgress,
    Failed,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Completed => "COMPLETED",
            ExecutionState::InProgress => "IN_PROGRESS",
            ExecutionState::Failed => "FAILED",
        }
    }
}

impl Serialize for ExecutionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub execution_state: ExecutionState,
    pub result_value: Value,
    pub output_message: String,
}

impl ActionOutcome {
    pub fn completed(message: impl Into<String>, result_value: impl Into<Value>) -> Self {
        Self {
            execution_state: ExecutionState::Completed,
            result_value: result_value.into(),
            output_message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            execution_state: ExecutionState::Failed,
            result_value: Value::Bool(false),
            output_message: message.into(),
        }
    }

    /// Async action still running; `additional_data` comes back on the next invocation
    pub fn in_progress(message: impl Into<String>, additional_data: String) -> Self {
        Self {
            execution_state: ExecutionState::InProgress,
            result_value: Value::String(additional_data),
            output_message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.execution_state == ExecutionState::Completed
    }
}

// ============================================================================
// TABLES
// ============================================================================

/// One table row as ordered column/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow(Vec<(String, String)>);

impl CsvRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn col(mut self, name: &str, value: impl Display) -> Self {
        self.0.push((name.to_string(), value.to_string()));
        self
    }

    /// Column that stays empty when the value is missing
    pub fn opt<T: Display>(self, name: &str, value: Option<T>) -> Self {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        self.col(name, value)
    }

    /// Comma joined list column
    pub fn list<T: AsRef<str>>(self, name: &str, values: &[T]) -> Self {
        let joined = values.iter().map(|v| v.as_ref()).collect::<Vec<_>>().join(", ");
        self.col(name, joined)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(column, _)| column.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Anything that renders as a table row
pub trait Tabular {
    fn to_csv(&self) -> CsvRow;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Columns are the union of all row columns in first-seen order
    pub fn from_rows(title: &str, rows: Vec<CsvRow>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }

        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        Self { title: title.to_string(), columns, rows }
    }

    pub fn from_items<T: Tabular>(title: &str, items: &[T]) -> Self {
        Self::from_rows(title, items.iter().map(Tabular::to_csv).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render header + rows as CSV
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ============================================================================
// SINK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub title: String,
    pub file_name: String,
    /// Base64 encoded content
    pub content: String,
}

impl Attachment {
    pub fn new(title: &str, file_name: &str, bytes: &[u8]) -> Self {
        Self {
            title: title.to_string(),
            file_name: file_name.to_string(),
            content: BASE64.encode(bytes),
        }
    }
}

/// Where actions put their displayable output
pub trait ResultSink {
    fn add_result_json(&mut self, json: Value);
    fn add_data_table(&mut self, table: DataTable);
    fn add_link(&mut self, title: &str, url: &str);
    fn add_attachment(&mut self, attachment: Attachment);
}

/// In-memory sink collected for the result document
#[derive(Debug, Clone, Default)]
pub struct ScriptOutput {
    pub json_result: Option<Value>,
    pub tables: Vec<DataTable>,
    pub links: Vec<Link>,
    pub attachments: Vec<Attachment>,
}

impl ScriptOutput {
    pub fn table(&self, title: &str) -> Option<&DataTable> {
        self.tables.iter().find(|table| table.title == title)
    }
}

impl ResultSink for ScriptOutput {
    fn add_result_json(&mut self, json: Value) {
        self.json_result = Some(json);
    }

    fn add_data_table(&mut self, table: DataTable) {
        self.tables.push(table);
    }

    fn add_link(&mut self, title: &str, url: &str) {
        self.links.push(Link { title: title.to_string(), url: url.to_string() });
    }

    fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }
}

// ============================================================================
// RESULT DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RenderedTable {
    pub title: String,
    pub csv: String,
}

/// What the binary prints on stdout
#[derive(Debug, Clone, Serialize)]
pub struct ScriptResult {
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_result: Option<Value>,
    pub tables: Vec<RenderedTable>,
    pub links: Vec<Link>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AlertInfo>,
}

impl ScriptResult {
    pub fn from_action(outcome: ActionOutcome, output: ScriptOutput) -> Self {
        let tables = output
            .tables
            .iter()
            .map(|table| RenderedTable {
                title: table.title.clone(),
                csv: table.to_csv().unwrap_or_else(|e| {
                    log::warn!("Failed to render table {}: {}", table.title, e);
                    String::new()
                }),
            })
            .collect();

        Self {
            outcome,
            json_result: output.json_result,
            tables,
            links: output.links,
            attachments: output.attachments,
            alerts: Vec::new(),
        }
    }

    pub fn from_connector(outcome: ActionOutcome, alerts: Vec<AlertInfo>) -> Self {
        Self {
            outcome,
            json_result: None,
            tables: Vec::new(),
            links: Vec::new(),
            attachments: Vec::new(),
            alerts,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
