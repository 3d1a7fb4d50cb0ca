//! SQL synthesis for builder-mode requests.
//!
//! Converts a structured [`QueryRequest`] into a paginated SELECT and a
//! matching COUNT. Raw SQL requests pass through untouched; the core never
//! parses or validates SQL.

use serde_json::Value;

use crate::filter::{Filter, Operator, scalar_text};
use crate::request::QueryRequest;
use crate::schema::DataType;

/// Trait for converting query parts to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

impl ToSql for QueryRequest {
    fn to_sql(&self) -> String {
        match &self.sql {
            Some(sql) if !sql.trim().is_empty() => sql.clone(),
            _ => self.to_select_sql(),
        }
    }
}

impl QueryRequest {
    /// Generate the paginated SELECT for the structured selection.
    fn to_select_sql(&self) -> String {
        self.select_sql_with(&[])
    }

    /// Paginated SELECT where each `(column, type)` in `casts` is read back
    /// as `CAST(column AS type) AS column`.
    pub fn select_sql_with(&self, casts: &[(String, &str)]) -> String {
        let mut sql = String::from("SELECT ");

        // Columns
        sql.push_str(&self.select_list(casts));

        sql.push_str(" FROM ");
        sql.push_str(self.table_name.as_deref().unwrap_or_default());
        sql.push_str(&self.where_sql());

        // ORDER BY
        if let Some(sort_by) = self.sort_by.as_deref().filter(|s| !s.is_empty()) {
            sql.push_str(&format!(" ORDER BY {} {}", sort_by, self.sort_order.sql_keyword()));
        }

        // LIMIT / OFFSET
        sql.push_str(&format!(" LIMIT {} OFFSET {}", self.page_size.get(), self.offset()));

        sql
    }

    /// Generate `SELECT COUNT(*)` over the same table and filters.
    ///
    /// Returns `None` for raw SQL. Callers running an aggregate select list
    /// should skip it (see [`is_aggregate`]); its row count is not the count
    /// of the base table.
    pub fn count_sql(&self) -> Option<String> {
        if self.is_raw() {
            return None;
        }
        let table = self.table_name.as_deref().filter(|t| !t.is_empty())?;
        Some(format!("SELECT COUNT(*) FROM {}{}", table, self.where_sql()))
    }

    /// Generate the un-paginated SELECT used for full exports.
    pub fn export_sql(&self, max_rows: u32) -> String {
        self.export_sql_with(max_rows, &[])
    }

    /// [`export_sql`](Self::export_sql) with the same casts as
    /// [`select_sql_with`](Self::select_sql_with).
    pub fn export_sql_with(&self, max_rows: u32, casts: &[(String, &str)]) -> String {
        if self.is_raw() {
            return self.to_sql();
        }
        format!(
            "SELECT {} FROM {}{} LIMIT {}",
            self.select_list(casts),
            self.table_name.as_deref().unwrap_or_default(),
            self.where_sql(),
            max_rows
        )
    }

    fn select_list(&self, casts: &[(String, &str)]) -> String {
        if self.columns.is_empty() {
            return "*".to_string();
        }
        self.columns
            .iter()
            .map(|column| match casts.iter().find(|(name, _)| name == column) {
                Some((_, sql_type)) => format!("CAST({0} AS {1}) AS {0}", column, sql_type),
                None => column.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn where_sql(&self) -> String {
        let mut sql = String::from(" WHERE 1=1");
        for filter in &self.filters {
            if let Some(cond) = filter.condition_sql() {
                sql.push_str(" AND ");
                sql.push_str(&cond);
            }
        }
        sql
    }
}

/// Returns true if the statement aggregates rows.
pub fn is_aggregate(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    ["GROUP BY", "SUM(", "COUNT(", "AVG("].iter().any(|k| upper.contains(k))
}

impl Filter {
    /// Convert a validated filter to a SQL condition.
    ///
    /// Returns `None` when a list operator has no usable list (an unvalidated
    /// filter), so the condition is skipped instead of emitting broken SQL.
    pub fn condition_sql(&self) -> Option<String> {
        match self.operator {
            Operator::Eq | Operator::Ne | Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => Some(
                format!("{} {} {}", self.field, self.operator.sql_symbol(), literal(&self.value, self.data_type)),
            ),
            Operator::Like => Some(format!(
                "{} LIKE '%{}%'",
                self.field,
                escape(&scalar_text(&self.value))
            )),
            Operator::In => match &self.value {
                Value::Array(items) if !items.is_empty() => {
                    let values: Vec<String> = items.iter().map(|v| literal(v, self.data_type)).collect();
                    Some(format!("{} IN ({})", self.field, values.join(", ")))
                }
                _ => None,
            },
            Operator::Between => match &self.value {
                Value::Array(items) if items.len() == 2 => Some(format!(
                    "{} BETWEEN {} AND {}",
                    self.field,
                    literal(&items[0], self.data_type),
                    literal(&items[1], self.data_type)
                )),
                _ => None,
            },
        }
    }
}

/// Render a value as a SQL literal for the declared type.
fn literal(value: &Value, data_type: DataType) -> String {
    match (data_type, value) {
        (DataType::Number, Value::Number(n)) => n.to_string(),
        (_, Value::Null) => "NULL".to_string(),
        (_, v) => format!("'{}'", escape(&scalar_text(v))),
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::validate;
    use crate::request::{PageSize, SortOrder};
    use pretty_assertions::assert_eq;

    fn users() -> QueryRequest {
        QueryRequest {
            table_name: Some("users".into()),
            columns: vec!["id".into(), "email".into()],
            ..QueryRequest::default()
        }
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(
            users().to_sql(),
            "SELECT id, email FROM users WHERE 1=1 LIMIT 50 OFFSET 0"
        );
    }

    #[test]
    fn test_select_with_sort_and_page() {
        let req = QueryRequest {
            page: 3,
            page_size: PageSize::Ten,
            sort_by: Some("created_at".into()),
            sort_order: SortOrder::Desc,
            ..users()
        };
        assert_eq!(
            req.to_sql(),
            "SELECT id, email FROM users WHERE 1=1 ORDER BY created_at DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_select_with_filters() {
        let filters = vec![
            Filter::new("age", Operator::Gte, "18", DataType::Number),
            Filter::new("name", Operator::Like, "o'b", DataType::Text),
            Filter::new("status", Operator::In, "new,open", DataType::Enum),
            Filter::new("joined", Operator::Between, "2024-01-01,2024-06-30", DataType::Date),
        ];
        let req = QueryRequest {
            filters: filters.iter().map(|f| validate(f).unwrap()).collect(),
            ..users()
        };
        assert_eq!(
            req.to_sql(),
            "SELECT id, email FROM users WHERE 1=1 AND age >= 18 AND name LIKE '%o''b%' \
             AND status IN ('new', 'open') AND joined BETWEEN '2024-01-01' AND '2024-06-30' \
             LIMIT 50 OFFSET 0"
        );
        assert_eq!(
            req.count_sql().unwrap(),
            "SELECT COUNT(*) FROM users WHERE 1=1 AND age >= 18 AND name LIKE '%o''b%' \
             AND status IN ('new', 'open') AND joined BETWEEN '2024-01-01' AND '2024-06-30'"
        );
    }

    #[test]
    fn test_raw_sql_passthrough() {
        let req = QueryRequest {
            sql: Some("SELECT region, SUM(total) FROM orders GROUP BY region".into()),
            ..users()
        };
        assert_eq!(req.to_sql(), "SELECT region, SUM(total) FROM orders GROUP BY region");
        assert_eq!(req.count_sql(), None);
        assert!(is_aggregate(&req.to_sql()));
    }

    #[test]
    fn test_unvalidated_list_is_skipped() {
        let f = Filter::new("status", Operator::In, "a,b", DataType::Enum);
        assert_eq!(f.condition_sql(), None);
    }

    #[test]
    fn test_export_sql() {
        assert_eq!(
            users().export_sql(10_000),
            "SELECT id, email FROM users WHERE 1=1 LIMIT 10000"
        );
    }

    #[test]
    fn test_casts_wrap_selected_columns() {
        let req = QueryRequest {
            columns: vec!["id".into(), "joined".into()],
            sort_by: Some("joined".into()),
            ..users()
        };
        let casts = vec![("joined".to_string(), "TEXT"), ("email".to_string(), "TEXT")];
        assert_eq!(
            req.select_sql_with(&casts),
            "SELECT id, CAST(joined AS TEXT) AS joined FROM users WHERE 1=1 \
             ORDER BY joined ASC LIMIT 50 OFFSET 0"
        );
        assert_eq!(
            req.export_sql_with(100, &casts),
            "SELECT id, CAST(joined AS TEXT) AS joined FROM users WHERE 1=1 LIMIT 100"
        );
    }
}
