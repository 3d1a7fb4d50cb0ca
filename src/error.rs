//! Error types for reportkit.
//!
//! Every failure is reported to the immediate caller. Nothing here is fatal to
//! the process and no operation leaves its input half-mutated.

use thiserror::Error;

use crate::schema::DataType;
use crate::filter::Operator;

/// A filter that cannot be applied as written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// The filter does not name a field.
    #[error("Filter has no field")]
    MissingField,

    /// The filter has no value (or an empty list for IN).
    #[error("Filter on '{field}' has no value")]
    MissingValue { field: String },

    /// The operator is not allowed for the declared type.
    #[error("Operator {operator} is not allowed for {data_type} fields")]
    IncompatibleOperator {
        operator: Operator,
        data_type: DataType,
    },

    /// The value cannot be read as the declared type.
    #[error("Value '{value}' for '{field}' is not a valid {data_type}")]
    UnparsableValue {
        field: String,
        value: String,
        data_type: DataType,
    },

    /// Unrecognised operator symbol.
    #[error("Unknown operator: '{0}'")]
    UnknownOperator(String),

    /// Unrecognised type name.
    #[error("Unknown filter type: '{0}'. Expected: text, number, date, or enum")]
    UnknownType(String),

    /// The field is not a column of the active table.
    #[error("Column '{field}' not found in table '{table}'{}", suggestion_suffix(.suggestion))]
    UnknownColumn {
        field: String,
        table: String,
        suggestion: Option<String>,
    },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

impl FilterError {
    /// Create a missing value error.
    pub fn missing_value(field: impl Into<String>) -> Self {
        Self::MissingValue {
            field: field.into(),
        }
    }

    /// Create an unparsable value error.
    pub fn unparsable(field: impl Into<String>, value: impl ToString, data_type: DataType) -> Self {
        Self::UnparsableValue {
            field: field.into(),
            value: value.to_string(),
            data_type,
        }
    }
}

/// A query request or template that cannot be assembled from the builder state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Builder mode needs at least one column.
    #[error("Please select at least one column")]
    NoColumnsSelected,

    /// Builder mode needs a table.
    #[error("No table selected")]
    NoTableSelected,

    /// Raw-SQL mode needs non-blank SQL.
    #[error("SQL query is empty")]
    BlankSql,

    /// Neither columns nor SQL to save.
    #[error("Please select columns or enter SQL query to save as template")]
    EmptyTemplate,

    /// A template needs a name.
    #[error("Template name is required")]
    MissingTemplateName,

    /// A filter failed validation.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Export failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// There are no rows to export.
    #[error("No data to export")]
    NothingToExport,
}

/// Template edit and serialization failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template needs a name.
    #[error("Template name is required")]
    MissingName,

    /// A template needs SQL.
    #[error("Template SQL is empty")]
    BlankSql,

    /// Template JSON could not be read or written.
    #[error("Template serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures talking to the execution collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The collaborator answered with a non-2xx status.
    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },

    /// The collaborator could not be reached.
    #[error("Collaborator unreachable: {0}")]
    Unreachable(String),

    /// The response body was not what the boundary expects.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Database error from the in-process engine.
    #[error("Database error: {0}")]
    Database(String),

    /// Template store IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The collaborator does not support this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl TransportError {
    /// Fallback message used when a failed response carries none.
    pub const GENERIC_MESSAGE: &'static str = "Failed to execute query";

    /// Build a status error, using the collaborator's message if present.
    pub fn status(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| Self::GENERIC_MESSAGE.to_string());
        Self::Status { status, message }
    }
}

/// Error class, as surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rule violation; the operation was not attempted.
    Validation,
    /// The collaborator failed; the operation was abandoned.
    Transport,
    /// Nothing to operate on; blocked before any request.
    EmptyInput,
    /// Local configuration problem.
    Config,
}

/// The umbrella error type for reportkit operations.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReportError {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Filter(_) => ErrorKind::Validation,
            Self::Build(BuildError::EmptyTemplate) => ErrorKind::EmptyInput,
            Self::Build(_) => ErrorKind::Validation,
            Self::Export(ExportError::NothingToExport) => ErrorKind::EmptyInput,
            Self::Template(TemplateError::Serde(_)) => ErrorKind::Transport,
            Self::Template(TemplateError::BlankSql) => ErrorKind::EmptyInput,
            Self::Template(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type alias for reportkit operations.
pub type ReportResult<T> = Result<T, ReportError>;
