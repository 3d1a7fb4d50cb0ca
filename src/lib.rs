//! # reportkit
//!
//! > **Pick a table, filter it, page through it, save it.**
//!
//! reportkit models interactive report queries: it turns table, column,
//! filter, sort and page selections (or a raw SQL statement) into a
//! well-formed [`QueryRequest`](request::QueryRequest), and turns the rows
//! that come back into a paginated, sortable, searchable view that can be
//! exported or saved as a named template.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use reportkit::prelude::*;
//!
//! let mut builder = QueryBuilder::new();
//! builder
//!     .select_table(TableInfo::new("orders").column("id", "integer", false))
//!     .set_columns(["id"])
//!     .add_filter(Filter::new("id", Operator::Gt, "100", DataType::Number))?;
//!
//! let request = builder.build()?;
//! let page = ReportDB::connect("sqlite://reports.db").await?.query(&request).await?;
//! ```
//!
//! ## Operators
//!
//! | Operator  | Label            | text | number | date | enum |
//! |-----------|------------------|------|--------|------|------|
//! | `=`       | Equals           | ✓    | ✓      | ✓    | ✓    |
//! | `!=`      | Not Equals       | ✓    | ✓      | ✓    | ✓    |
//! | `>` `<`   | Greater/Less     |      | ✓      | ✓    |      |
//! | `>=` `<=` | ... or Equal     |      | ✓      | ✓    |      |
//! | `LIKE`    | Contains         | ✓    |        |      |      |
//! | `IN`      | In List          | ✓    | ✓      |      | ✓    |
//! | `BETWEEN` | Between          |      | ✓      | ✓    |      |
//!
//! Execution happens behind the [`Collaborator`](collaborator::Collaborator)
//! trait: [`ReportDB`](engine::ReportDB) runs requests in-process with sqlx,
//! [`ApiClient`](client::ApiClient) sends them to a report backend over HTTP.

pub mod builder;
pub mod client;
pub mod collaborator;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod page;
pub mod request;
pub mod schema;
pub mod session;
pub mod store;
pub mod template;
pub mod transpiler;

pub mod prelude {
    pub use crate::builder::{Mode, QueryBuilder};
    pub use crate::client::ApiClient;
    pub use crate::collaborator::Collaborator;
    pub use crate::engine::ReportDB;
    pub use crate::error::*;
    pub use crate::export::{to_csv, to_json};
    pub use crate::filter::{Coercion, Filter, Operator, operators_for, validate, validate_with};
    pub use crate::page::{PageView, ResultPage, Row};
    pub use crate::request::{PageSize, QueryRequest, SortOrder};
    pub use crate::schema::{ColumnInfo, DataType, TableInfo};
    pub use crate::session::Session;
    pub use crate::store::{FileTemplateStore, MemoryTemplateStore, TemplateStore};
    pub use crate::template::{ReportTemplate, TemplateShelf};
    pub use crate::transpiler::ToSql;
}

/// Parse and validate a `field<op>value` filter expression.
///
/// # Example
///
/// ```
/// use reportkit::parse_filter;
/// use reportkit::schema::DataType;
///
/// let filter = parse_filter("age >= 30", DataType::Number).unwrap();
/// assert_eq!(filter.value, serde_json::json!(30));
/// ```
pub fn parse_filter(expr: &str, data_type: schema::DataType) -> Result<filter::Filter, error::FilterError> {
    filter::validate(&filter::Filter::parse(expr)?.with_type(data_type))
}
