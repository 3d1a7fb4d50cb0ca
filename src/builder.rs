//! Query Request Builder.
//!
//! Two modes share one draft record: switching between Builder Mode and
//! Raw-SQL Mode never discards the structured selections or the SQL text, so
//! toggling back restores what was there.

use crate::error::{BuildError, FilterError};
use crate::filter::{Coercion, Filter, validate_in, validate_with};
use crate::request::{PageSize, QueryRequest, SortOrder};
use crate::schema::TableInfo;
use crate::template::ReportTemplate;

/// Which part of the draft is the effective query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Table, columns and filters.
    #[default]
    Builder,
    /// Free-form SQL text.
    RawSql,
}

/// Everything the user has entered, in both modes.
#[derive(Debug, Clone, PartialEq, Default)]
struct Draft {
    table: Option<TableInfo>,
    columns: Vec<String>,
    filters: Vec<Filter>,
    sql: String,
    page: u32,
    page_size: PageSize,
    sort_by: Option<String>,
    sort_order: SortOrder,
}

/// Interactive builder for [`QueryRequest`]s and [`ReportTemplate`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    mode: Mode,
    draft: Draft,
    coercion: Coercion,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            mode: Mode::Builder,
            draft: Draft {
                page: 1,
                ..Draft::default()
            },
            coercion: Coercion::default(),
        }
    }

    /// Use strict numeric validation for filters.
    pub fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    // ----- mode -----

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        if self.mode != mode {
            tracing::debug!(?mode, "builder mode changed");
        }
        self.mode = mode;
        self
    }

    /// Switch between Builder Mode and Raw-SQL Mode.
    pub fn toggle_mode(&mut self) -> Mode {
        let next = match self.mode {
            Mode::Builder => Mode::RawSql,
            Mode::RawSql => Mode::Builder,
        };
        self.set_mode(next);
        next
    }

    // ----- table and columns -----

    pub fn table(&self) -> Option<&TableInfo> {
        self.draft.table.as_ref()
    }

    /// Select a table. Picking a different table clears the columns,
    /// filters and sort column chosen for the previous one.
    pub fn select_table(&mut self, table: TableInfo) -> &mut Self {
        let changed = self.draft.table.as_ref().is_none_or(|t| t.name != table.name);
        if changed {
            self.draft.columns.clear();
            self.draft.filters.clear();
            self.draft.sort_by = None;
            self.draft.page = 1;
        }
        self.draft.table = Some(table);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.draft.columns
    }

    /// Replace the selected columns. Duplicates keep their first position.
    pub fn set_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.columns = dedupe(columns.into_iter().map(Into::into));
        self
    }

    /// Add the column if it is not selected, remove it if it is.
    pub fn toggle_column(&mut self, name: &str) -> &mut Self {
        if let Some(pos) = self.draft.columns.iter().position(|c| c == name) {
            self.draft.columns.remove(pos);
        } else {
            self.draft.columns.push(name.to_string());
        }
        self
    }

    /// Select every column of the current table, in ordinal order.
    pub fn select_all_columns(&mut self) -> &mut Self {
        if let Some(table) = &self.draft.table {
            self.draft.columns = table.column_names();
        }
        self
    }

    pub fn clear_columns(&mut self) -> &mut Self {
        self.draft.columns.clear();
        self
    }

    // ----- filters -----

    pub fn filters(&self) -> &[Filter] {
        &self.draft.filters
    }

    /// Validate and append a filter.
    pub fn add_filter(&mut self, filter: Filter) -> Result<&mut Self, FilterError> {
        let filter = self.check_filter(&filter)?;
        self.draft.filters.push(filter);
        Ok(self)
    }

    /// Validate and replace the filter at `index`, returning the old one.
    /// Returns `Ok(None)` when there is no filter at `index`.
    pub fn update_filter(&mut self, index: usize, filter: Filter) -> Result<Option<Filter>, FilterError> {
        if index >= self.draft.filters.len() {
            return Ok(None);
        }
        let filter = self.check_filter(&filter)?;
        Ok(Some(std::mem::replace(&mut self.draft.filters[index], filter)))
    }

    pub fn remove_filter(&mut self, index: usize) -> Option<Filter> {
        (index < self.draft.filters.len()).then(|| self.draft.filters.remove(index))
    }

    fn check_filter(&self, filter: &Filter) -> Result<Filter, FilterError> {
        match self.draft.table.as_ref().filter(|t| !t.columns.is_empty()) {
            Some(table) => validate_in(filter, table, self.coercion),
            None => validate_with(filter, self.coercion),
        }
    }

    // ----- raw sql -----

    pub fn sql(&self) -> &str {
        &self.draft.sql
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.draft.sql = sql.into();
        self
    }

    // ----- pagination and sort -----

    pub fn page(&self) -> u32 {
        self.draft.page
    }

    pub fn set_page(&mut self, page: u32) -> &mut Self {
        self.draft.page = page.max(1);
        self
    }

    pub fn page_size(&self) -> PageSize {
        self.draft.page_size
    }

    pub fn set_page_size(&mut self, page_size: PageSize) -> &mut Self {
        self.draft.page_size = page_size;
        self
    }

    pub fn sort(&self) -> (Option<&str>, SortOrder) {
        (self.draft.sort_by.as_deref(), self.draft.sort_order)
    }

    /// Server-side ordering for the next request. An empty column clears it.
    ///
    /// When the selected table lists its columns, the sort column must be
    /// one of them; nothing changes on error.
    pub fn set_sort(&mut self, sort_by: Option<&str>, sort_order: SortOrder) -> Result<&mut Self, FilterError> {
        let sort_by = sort_by.map(str::trim).filter(|s| !s.is_empty());
        if let Some(column) = sort_by {
            self.check_sort(column)?;
        }
        self.draft.sort_by = sort_by.map(str::to_string);
        self.draft.sort_order = sort_order;
        Ok(self)
    }

    fn check_sort(&self, column: &str) -> Result<(), FilterError> {
        match self.draft.table.as_ref().filter(|t| !t.columns.is_empty()) {
            Some(table) => table.find_column(column).map(|_| ()),
            None => Ok(()),
        }
    }

    // ----- outputs -----

    /// Assemble the request for the current mode.
    ///
    /// Page, page size, sort and table name are always included, and in
    /// Raw-SQL Mode the structured selections ride along unvalidated.
    pub fn build(&self) -> Result<QueryRequest, BuildError> {
        let (sql, filters) = match self.mode {
            Mode::Builder => {
                if self.draft.columns.is_empty() {
                    return Err(BuildError::NoColumnsSelected);
                }
                if self.draft.table.is_none() {
                    return Err(BuildError::NoTableSelected);
                }
                let filters = self
                    .draft
                    .filters
                    .iter()
                    .map(|f| self.check_filter(f))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(column) = &self.draft.sort_by {
                    self.check_sort(column)?;
                }
                (None, filters)
            }
            Mode::RawSql => {
                if self.draft.sql.trim().is_empty() {
                    return Err(BuildError::BlankSql);
                }
                (Some(self.draft.sql.clone()), self.draft.filters.clone())
            }
        };

        let request = QueryRequest {
            table_name: self.draft.table.as_ref().map(|t| t.name.clone()),
            columns: self.draft.columns.clone(),
            filters,
            sql,
            page: self.draft.page,
            page_size: self.draft.page_size,
            sort_by: self.draft.sort_by.clone(),
            sort_order: self.draft.sort_order,
        };
        tracing::debug!(mode = ?self.mode, page = request.page, page_size = %request.page_size, "built query request");
        Ok(request)
    }

    /// `SELECT <columns> FROM <table>` for the current selection.
    pub fn synthesized_sql(&self) -> Option<String> {
        let table = self.draft.table.as_ref()?;
        if self.draft.columns.is_empty() {
            return None;
        }
        Some(format!("SELECT {} FROM {}", self.draft.columns.join(", "), table.name))
    }

    /// Restore a saved template: Raw-SQL Mode with its SQL, and its columns
    /// and filters (when present) replacing the current ones.
    pub fn load_template(&mut self, template: &ReportTemplate) -> &mut Self {
        self.set_mode(Mode::RawSql);
        self.draft.sql = template.sql.clone();
        if let Some(columns) = &template.columns {
            self.draft.columns = dedupe(columns.iter().cloned());
        }
        if let Some(filters) = &template.filters {
            self.draft.filters = filters.clone();
        }
        self
    }

    /// Snapshot the current state as a new, unsaved template.
    ///
    /// The SQL comes from the active mode, falling back to the other one.
    pub fn to_template(&self, name: &str) -> Result<ReportTemplate, BuildError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BuildError::MissingTemplateName);
        }

        let raw = Some(self.draft.sql.clone()).filter(|s| !s.trim().is_empty());
        let synthesized = self.synthesized_sql();
        let sql = match self.mode {
            Mode::RawSql => raw.or(synthesized),
            Mode::Builder => synthesized.or(raw),
        };

        let sql = match sql {
            Some(sql) => sql,
            None if self.draft.columns.is_empty() => return Err(BuildError::EmptyTemplate),
            None => return Err(BuildError::NoTableSelected),
        };

        Ok(ReportTemplate::new(name, sql)
            .with_columns(self.draft.columns.clone())
            .with_filters(self.draft.filters.clone()))
    }
}

fn dedupe(columns: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in columns {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;
    use crate::schema::DataType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn users() -> TableInfo {
        TableInfo::new("users")
            .column("id", "integer", false)
            .column("name", "text", false)
            .column("age", "integer", true)
    }

    fn builder() -> QueryBuilder {
        let mut b = QueryBuilder::new();
        b.select_table(users());
        b
    }

    #[test]
    fn test_no_columns_always_fails() {
        let mut b = builder();
        b.set_sql("SELECT 1").set_page(4).set_sort(Some("id"), SortOrder::Desc).unwrap();
        assert_eq!(b.build(), Err(BuildError::NoColumnsSelected));

        assert_eq!(QueryBuilder::new().build(), Err(BuildError::NoColumnsSelected));
    }

    #[test]
    fn test_build_builder_mode() {
        let mut b = builder();
        b.toggle_column("name").toggle_column("id");
        b.add_filter(Filter::new("age", Operator::Gt, "21", DataType::Number)).unwrap();
        b.set_page_size(PageSize::Ten).set_sort(Some("id"), SortOrder::Desc).unwrap();

        let req = b.build().unwrap();
        assert_eq!(req.table_name.as_deref(), Some("users"));
        assert_eq!(req.columns, vec!["name", "id"]);
        assert_eq!(req.filters[0].value, json!(21));
        assert_eq!(req.sql, None);
        assert_eq!((req.page, req.page_size), (1, PageSize::Ten));
        assert_eq!((req.sort_by.as_deref(), req.sort_order), (Some("id"), SortOrder::Desc));
    }

    #[test]
    fn test_filter_must_reference_table_column() {
        let mut b = builder();
        let err = b
            .add_filter(Filter::new("agee", Operator::Gt, 1, DataType::Number))
            .unwrap_err();
        assert!(matches!(err, FilterError::UnknownColumn { suggestion: Some(ref s), .. } if s == "age"));
        assert!(b.filters().is_empty());
    }

    #[test]
    fn test_sort_must_reference_table_column() {
        let mut b = builder();
        b.set_columns(["id"]);
        b.set_sort(Some("age"), SortOrder::Desc).unwrap();

        let err = b.set_sort(Some("nmae"), SortOrder::Asc).unwrap_err();
        assert_eq!(
            err,
            FilterError::UnknownColumn {
                field: "nmae".into(),
                table: "users".into(),
                suggestion: Some("name".into()),
            }
        );
        assert_eq!(b.sort(), (Some("age"), SortOrder::Desc));

        b.set_sort(Some("  "), SortOrder::Asc).unwrap();
        assert_eq!(b.sort(), (None, SortOrder::Asc));

        // without a column list any name is accepted
        let mut bare = QueryBuilder::new();
        bare.select_table(TableInfo::new("events")).set_columns(["id"]);
        bare.set_sort(Some("happened"), SortOrder::Asc).unwrap();
        assert_eq!(bare.build().unwrap().sort_by.as_deref(), Some("happened"));
    }

    #[test]
    fn test_raw_mode_requires_sql_and_keeps_selection() {
        let mut b = builder();
        b.toggle_column("id");
        b.toggle_mode();
        assert_eq!(b.build(), Err(BuildError::BlankSql));

        b.set_sql("SELECT count(*) FROM users");
        let req = b.build().unwrap();
        assert_eq!(req.sql.as_deref(), Some("SELECT count(*) FROM users"));
        assert_eq!(req.columns, vec!["id"]);
        assert_eq!(req.table_name.as_deref(), Some("users"));
    }

    #[test]
    fn test_toggle_is_lossless() {
        let mut b = builder();
        b.set_columns(["id", "name"]).set_sql("SELECT 1");
        let before = b.clone();

        assert_eq!(b.toggle_mode(), Mode::RawSql);
        assert_eq!(b.toggle_mode(), Mode::Builder);
        assert_eq!(b, before);
    }

    #[test]
    fn test_select_other_table_resets_selection() {
        let mut b = builder();
        b.set_columns(["id"]);
        b.select_table(users());
        assert_eq!(b.columns(), ["id"]);

        b.select_table(TableInfo::new("orders").column("id", "integer", false));
        assert!(b.columns().is_empty());
        b.select_all_columns();
        assert_eq!(b.columns(), ["id"]);
    }

    #[test]
    fn test_set_columns_dedupes() {
        let mut b = builder();
        b.set_columns(["id", "name", "id"]);
        assert_eq!(b.columns(), ["id", "name"]);
    }

    #[test]
    fn test_load_template_is_idempotent() {
        let template = ReportTemplate::new("t", "SELECT id FROM users WHERE age > 3")
            .with_columns(vec!["id".into()])
            .with_filters(vec![Filter::new("age", Operator::Gt, 3, DataType::Number)]);

        let mut b = builder();
        b.set_columns(["name", "age"]);
        b.load_template(&template);
        let once = b.clone();
        b.load_template(&template);

        assert_eq!(b, once);
        assert_eq!(b.mode(), Mode::RawSql);
        assert_eq!(b.sql(), template.sql);
        assert_eq!(b.columns(), ["id"]);
        assert_eq!(b.filters(), template.filters.as_deref().unwrap());
    }

    #[test]
    fn test_load_template_without_columns_keeps_selection() {
        let mut b = builder();
        b.set_columns(["name"]);
        b.load_template(&ReportTemplate::new("t", "SELECT 1"));
        assert_eq!(b.columns(), ["name"]);
    }

    #[test]
    fn test_to_template() {
        let mut b = builder();
        assert_eq!(b.to_template("empty"), Err(BuildError::EmptyTemplate));
        assert_eq!(b.to_template(" "), Err(BuildError::MissingTemplateName));

        b.set_columns(["id", "name"]);
        let t = b.to_template("names").unwrap();
        assert_eq!(t.sql, "SELECT id, name FROM users");
        assert_eq!(t.columns, Some(vec!["id".to_string(), "name".to_string()]));

        b.set_sql("SELECT * FROM users LIMIT 5").set_mode(Mode::RawSql);
        assert_eq!(b.to_template("raw").unwrap().sql, "SELECT * FROM users LIMIT 5");

        b.set_mode(Mode::Builder);
        assert_eq!(b.to_template("builder").unwrap().sql, "SELECT id, name FROM users");
    }

    #[test]
    fn test_template_from_raw_mode_restores_selection() {
        let mut b = builder();
        b.set_columns(["id"]);
        b.add_filter(Filter::new("name", Operator::Like, "jo", DataType::Text)).unwrap();
        b.set_mode(Mode::RawSql).set_sql("SELECT id FROM users WHERE name LIKE '%jo%'");
        let template = b.to_template("jo").unwrap();

        let mut fresh = QueryBuilder::new();
        fresh.select_table(users());
        fresh.load_template(&template);
        fresh.set_mode(Mode::Builder);
        let req = fresh.build().unwrap();
        assert_eq!(req.columns, vec!["id"]);
        assert_eq!(req.filters, b.filters());
    }
}
