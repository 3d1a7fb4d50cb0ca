//! Result Page Model.
//!
//! A [`ResultPage`] is one bounded slice of a result set plus the metadata to
//! navigate to other slices. It is replaced wholesale on every execution.
//!
//! [`PageView`] adds client-local operations over the rows of that page.
//! **Search and sort never look beyond the current page**: a term that only
//! matches rows on page 3 finds nothing while page 1 is loaded, and `total`
//! and `total_pages` keep describing the fetched result set. Server-side
//! ordering is a separate concern, carried by `sort_by`/`sort_order` on the
//! next [`QueryRequest`](crate::request::QueryRequest).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::filter::scalar_text;
use crate::request::SortOrder;

/// One result row: field name to scalar, in column order.
pub type Row = Map<String, Value>;

/// Number of pages for `total` rows, never less than one.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// The `POST /query` response body as the collaborator sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default, alias = "rows")]
    pub data: Vec<Row>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// A fetched page of rows with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "QueryResponse", into = "QueryResponse")]
pub struct ResultPage {
    rows: Vec<Row>,
    total: u64,
    page: u32,
    page_size: u32,
    total_pages: u32,
}

impl ResultPage {
    /// Build a page, enforcing `page >= 1`, `page_size >= 1` and
    /// `rows.len() <= page_size`.
    ///
    /// A zero `page_size` is read as "everything returned fits on one page".
    pub fn new(mut rows: Vec<Row>, total: u64, page: u32, page_size: u32) -> Self {
        let page_size = if page_size == 0 {
            u32::try_from(rows.len().max(1)).unwrap_or(u32::MAX)
        } else {
            page_size
        };

        let limit = page_size as usize;
        if rows.len() > limit {
            tracing::warn!(
                received = rows.len(),
                page_size,
                "collaborator returned more rows than the page size; truncating"
            );
            rows.truncate(limit);
        }

        Self {
            rows,
            total,
            page: page.max(1),
            page_size,
            total_pages: total_pages(total, page_size),
        }
    }

    /// The page shown before anything has been executed.
    pub fn empty(page_size: u32) -> Self {
        Self::new(Vec::new(), 0, 1, page_size)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 1-based row numbers shown on this page, e.g. `(51, 100)`.
    pub fn range(&self) -> Option<(u64, u64)> {
        if self.rows.is_empty() {
            return None;
        }
        let start = u64::from(self.page - 1) * u64::from(self.page_size) + 1;
        Some((start, start + self.rows.len() as u64 - 1))
    }

    /// Field names of the first row, in order. Empty when there are no rows.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl From<QueryResponse> for ResultPage {
    fn from(resp: QueryResponse) -> Self {
        let page = Self::new(resp.data, resp.total, resp.page, resp.page_size);
        if resp.total_pages != 0 && resp.total_pages != page.total_pages {
            tracing::debug!(
                reported = resp.total_pages,
                computed = page.total_pages,
                "ignoring inconsistent totalPages from collaborator"
            );
        }
        page
    }
}

impl From<ResultPage> for QueryResponse {
    fn from(page: ResultPage) -> Self {
        Self {
            data: page.rows,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }
}

/// Client-local view over one [`ResultPage`].
#[derive(Debug, Clone)]
pub struct PageView {
    page: ResultPage,
    sort: Option<(String, SortOrder)>,
}

impl PageView {
    pub fn new(page: ResultPage) -> Self {
        Self { page, sort: None }
    }

    pub fn page(&self) -> &ResultPage {
        &self.page
    }

    /// Replace the page after a new fetch. Local sort state is dropped.
    pub fn replace(&mut self, page: ResultPage) {
        self.page = page;
        self.sort = None;
    }

    /// Rows in their current (possibly locally sorted) order.
    pub fn rows(&self) -> &[Row] {
        &self.page.rows
    }

    /// Field names of the first row; empty means "no results".
    pub fn columns(&self) -> Vec<String> {
        self.page.columns()
    }

    /// Rows of the current page with any field containing `term`,
    /// case-insensitively. An empty term matches every row.
    pub fn search(&self, term: &str) -> Vec<&Row> {
        if term.is_empty() {
            return self.page.rows.iter().collect();
        }
        let needle = term.to_lowercase();
        self.page
            .rows
            .iter()
            .filter(|row| row.values().any(|v| scalar_text(v).to_lowercase().contains(&needle)))
            .collect()
    }

    /// Sort the current page by `column`.
    ///
    /// The same column again flips the direction; a new column starts
    /// ascending. The sort is stable and never triggers a fetch.
    pub fn sort_page(&mut self, column: &str) -> (&[Row], SortOrder) {
        let order = match &self.sort {
            Some((current, order)) if current == column => order.flip(),
            _ => SortOrder::Asc,
        };

        self.page.rows.sort_by(|a, b| {
            let ord = compare_values(a.get(column), b.get(column));
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        self.sort = Some((column.to_string(), order));

        (&self.page.rows, order)
    }

    /// Current local sort column and direction.
    pub fn sort_state(&self) -> Option<(&str, SortOrder)> {
        self.sort.as_ref().map(|(c, o)| (c.as_str(), *o))
    }

    /// Clamp a requested page number to `[1, total_pages]`.
    pub fn go_to_page(&self, n: u32) -> u32 {
        n.clamp(1, self.page.total_pages)
    }

    pub fn next_page(&self) -> u32 {
        self.go_to_page(self.page.page.saturating_add(1))
    }

    pub fn prev_page(&self) -> u32 {
        self.go_to_page(self.page.page.saturating_sub(1))
    }

    pub fn has_next(&self) -> bool {
        self.page.page < self.page.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page.page > 1
    }
}

/// Order JSON scalars: null, bools, numbers, strings, then anything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
