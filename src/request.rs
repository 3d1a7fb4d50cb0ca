//! The canonical query request sent to the execution collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::filter::Filter;

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// The opposite direction.
    pub fn flip(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn sql_keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// Rows per page. Only the sizes offered for selection are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum PageSize {
    Ten,
    TwentyFive,
    #[default]
    Fifty,
    Hundred,
}

impl PageSize {
    pub const ALL: [PageSize; 4] = [PageSize::Ten, PageSize::TwentyFive, PageSize::Fifty, PageSize::Hundred];

    pub fn get(self) -> u32 {
        match self {
            PageSize::Ten => 10,
            PageSize::TwentyFive => 25,
            PageSize::Fifty => 50,
            PageSize::Hundred => 100,
        }
    }
}

impl TryFrom<u32> for PageSize {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        PageSize::ALL
            .into_iter()
            .find(|size| size.get() == n)
            .ok_or_else(|| format!("Invalid page size: {}. Expected one of 10, 25, 50, 100", n))
    }
}

impl From<PageSize> for u32 {
    fn from(size: PageSize) -> Self {
        size.get()
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

fn first_page() -> u32 {
    1
}

/// A query request: either a structured selection or raw SQL.
///
/// When `sql` is set it is the effective query source. `columns`, `filters`
/// and `table_name` then only ride along so a template saved from it can be
/// re-edited later; they are not re-validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            table_name: None,
            columns: Vec::new(),
            filters: Vec::new(),
            sql: None,
            page: 1,
            page_size: PageSize::default(),
            sort_by: None,
            sort_order: SortOrder::default(),
        }
    }
}

impl QueryRequest {
    /// True when raw SQL is the effective query source.
    pub fn is_raw(&self) -> bool {
        self.sql.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Row offset of the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size.get())
    }

    /// Copy of this request for a different page.
    pub fn for_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_size_wire() {
        assert_eq!(serde_json::to_string(&PageSize::TwentyFive).unwrap(), "25");
        assert_eq!(serde_json::from_str::<PageSize>("100").unwrap(), PageSize::Hundred);
        assert!(serde_json::from_str::<PageSize>("30").is_err());
    }

    #[test]
    fn test_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"columns":["id"],"tableName":"users"}"#).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, PageSize::Fifty);
        assert_eq!(req.sort_order, SortOrder::Asc);
        assert!(!req.is_raw());
    }

    #[test]
    fn test_request_wire_names() {
        let req = QueryRequest {
            table_name: Some("users".into()),
            columns: vec!["id".into()],
            sort_by: Some("id".into()),
            sort_order: SortOrder::Desc,
            page: 3,
            page_size: PageSize::Ten,
            ..QueryRequest::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tableName": "users",
                "columns": ["id"],
                "filters": [],
                "page": 3,
                "pageSize": 10,
                "sortBy": "id",
                "sortOrder": "desc"
            })
        );
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_sort_order_flip() {
        assert_eq!(SortOrder::Asc.flip(), SortOrder::Desc);
        assert_eq!(SortOrder::Desc.flip().flip(), SortOrder::Desc);
    }
}
