//! The execution collaborator boundary.
//!
//! Everything that touches a data source goes through [`Collaborator`]:
//! schema introspection, query execution and full exports. The core builds
//! requests and interprets responses; it never executes SQL itself.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::page::ResultPage;
use crate::request::QueryRequest;
use crate::schema::{ColumnInfo, TableInfo};

/// Rows fetched for a full export.
pub const EXPORT_ROW_LIMIT: u32 = 10_000;

/// Something that can describe tables and run query requests.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// `GET /tables`
    async fn tables(&self) -> Result<Vec<TableInfo>, TransportError>;

    /// `GET /tables/{table}/columns`
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, TransportError> {
        Ok(self
            .tables()
            .await?
            .into_iter()
            .find(|t| t.name == table)
            .map(|t| t.columns)
            .unwrap_or_default())
    }

    /// `POST /query`
    async fn query(&self, request: &QueryRequest) -> Result<ResultPage, TransportError>;

    /// `POST /export`: CSV bytes of the un-paginated result.
    /// Empty when the query matched nothing.
    async fn export(&self, request: &QueryRequest) -> Result<Vec<u8>, TransportError>;
}
