//! HTTP execution collaborator.
//!
//! Speaks the JSON API of a report backend:
//!
//! | method | path                      | body            | response            |
//! |--------|---------------------------|-----------------|---------------------|
//! | GET    | `/tables`                 |                 | `[TableInfo]`       |
//! | GET    | `/tables/{table}/columns` |                 | `[ColumnInfo]`      |
//! | POST   | `/query`                  | `QueryRequest`  | `QueryResponse`     |
//! | POST   | `/export`                 | `QueryRequest`  | CSV bytes           |
//! | GET    | `/templates`              |                 | `[ReportTemplate]`  |
//! | POST   | `/templates`              | `ReportTemplate`| `ReportTemplate`    |
//! | DELETE | `/templates/{id}`         |                 |                     |
//!
//! Failed responses surface the backend's `{"error": "..."}` message when
//! there is one. Nothing is retried.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::collaborator::Collaborator;
use crate::error::TransportError;
use crate::page::{QueryResponse, ResultPage};
use crate::request::QueryRequest;
use crate::schema::{ColumnInfo, TableInfo};
use crate::store::TemplateStore;
use crate::template::ReportTemplate;

/// Default backend location.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// A client for a report backend's HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = request.send().await.map_err(map_reqwest)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);
        tracing::debug!(status = status.as_u16(), ?message, "backend returned an error");
        Err(TransportError::status(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, TransportError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn map_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl Collaborator for ApiClient {
    async fn tables(&self) -> Result<Vec<TableInfo>, TransportError> {
        tracing::debug!(base = %self.base_url, "GET /tables");
        // the backend answers `null` when there are no tables
        let tables: Option<Vec<TableInfo>> = self.send_json(self.http.get(self.url("/tables"))).await?;
        Ok(tables.unwrap_or_default())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, TransportError> {
        let path = format!("/tables/{}/columns", table);
        tracing::debug!(base = %self.base_url, %path, "GET");
        let columns: Option<Vec<ColumnInfo>> = self.send_json(self.http.get(self.url(&path))).await?;
        Ok(columns.unwrap_or_default())
    }

    async fn query(&self, request: &QueryRequest) -> Result<ResultPage, TransportError> {
        tracing::debug!(base = %self.base_url, page = request.page, "POST /query");
        let response: QueryResponse = self
            .send_json(self.http.post(self.url("/query")).json(request))
            .await?;
        Ok(ResultPage::from(response))
    }

    async fn export(&self, request: &QueryRequest) -> Result<Vec<u8>, TransportError> {
        tracing::debug!(base = %self.base_url, "POST /export");
        let response = self.send(self.http.post(self.url("/export")).json(request)).await?;
        let bytes = response.bytes().await.map_err(map_reqwest)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TemplateStore for ApiClient {
    async fn list(&self) -> Result<Vec<ReportTemplate>, TransportError> {
        tracing::debug!(base = %self.base_url, "GET /templates");
        let templates: Option<Vec<ReportTemplate>> = self.send_json(self.http.get(self.url("/templates"))).await?;
        Ok(templates.unwrap_or_default())
    }

    async fn save(&self, template: &ReportTemplate) -> Result<ReportTemplate, TransportError> {
        tracing::debug!(base = %self.base_url, id = ?template.id, "POST /templates");
        self.send_json(self.http.post(self.url("/templates")).json(template))
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), TransportError> {
        let path = format!("/templates/{}", id);
        tracing::debug!(base = %self.base_url, %path, "DELETE");
        self.send(self.http.delete(self.url(&path))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:8080/api/");
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        assert_eq!(client.url("/query"), "http://localhost:8080/api/query");
    }

    #[test]
    fn test_error_body_parsing() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"pq: syntax error"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("pq: syntax error"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"x"}"#).unwrap();
        assert_eq!(body.error, None);
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // port 9 (discard) on localhost is closed in test environments
        let client = ApiClient::new("http://127.0.0.1:9/api");
        let err = client.tables().await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
