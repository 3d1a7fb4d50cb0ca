//! Filter Model: typed predicates and operator compatibility.
//!
//! | type   | allowed operators                   |
//! |--------|-------------------------------------|
//! | text   | `=` `!=` `LIKE` `IN`                |
//! | number | `=` `!=` `>` `<` `>=` `<=` `IN` `BETWEEN` |
//! | date   | `=` `!=` `>` `<` `>=` `<=` `BETWEEN` |
//! | enum   | `=` `!=` `IN`                       |
//!
//! Validation never mutates its input. A successful [`validate`] returns a
//! normalized copy: numbers parsed, `IN` lists split into arrays, `BETWEEN`
//! bounds split into a two-element array.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;
use crate::schema::{DataType, TableInfo};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (=)
    #[serde(rename = "=")]
    Eq,
    /// Not equal (!=)
    #[serde(rename = "!=")]
    Ne,
    /// Greater than (>)
    #[serde(rename = ">")]
    Gt,
    /// Less than (<)
    #[serde(rename = "<")]
    Lt,
    /// Greater than or equal (>=)
    #[serde(rename = ">=")]
    Gte,
    /// Less than or equal (<=)
    #[serde(rename = "<=")]
    Lte,
    /// Substring match, rendered as `LIKE '%v%'`
    #[serde(rename = "LIKE")]
    Like,
    /// Membership in a list
    #[serde(rename = "IN")]
    In,
    /// Inclusive range; value holds exactly two bounds
    #[serde(rename = "BETWEEN")]
    Between,
}

impl Operator {
    /// Every operator, in the order they are offered for selection.
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Like,
        Operator::In,
        Operator::Between,
    ];

    /// Returns the SQL symbol/keyword for this operator.
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::Between => "BETWEEN",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Operator::Eq => "Equals",
            Operator::Ne => "Not Equals",
            Operator::Gt => "Greater Than",
            Operator::Lt => "Less Than",
            Operator::Gte => "Greater or Equal",
            Operator::Lte => "Less or Equal",
            Operator::Like => "Contains",
            Operator::In => "In List",
            Operator::Between => "Between",
        }
    }

    /// Returns true if this operator takes a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::Between)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_symbol())
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Operator::ALL
            .into_iter()
            .find(|op| op.sql_symbol().eq_ignore_ascii_case(s))
            .or(if s == "<>" { Some(Operator::Ne) } else { None })
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}

const TEXT_OPS: &[Operator] = &[Operator::Eq, Operator::Ne, Operator::Like, Operator::In];
const NUMBER_OPS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::In,
    Operator::Between,
];
const DATE_OPS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::Between,
];
const ENUM_OPS: &[Operator] = &[Operator::Eq, Operator::Ne, Operator::In];

/// The operators allowed for a data type, in selection order.
pub fn operators_for(data_type: DataType) -> &'static [Operator] {
    match data_type {
        DataType::Text => TEXT_OPS,
        DataType::Number => NUMBER_OPS,
        DataType::Date => DATE_OPS,
        DataType::Enum => ENUM_OPS,
    }
}

/// How to treat a number filter whose value is not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coercion {
    /// Invalid numeric input becomes 0.
    #[default]
    Lenient,
    /// Invalid numeric input is an `UnparsableValue` error.
    Strict,
}

/// A single predicate applied to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    /// `null` means no value has been entered yet.
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
        data_type: DataType,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            data_type,
        }
    }

    /// Parse a `field<op>value` expression, e.g. `age>=30`, `name LIKE jo`,
    /// `status IN a,b`, `price BETWEEN 1,5`. The type defaults to text.
    ///
    /// The leftmost operator splits the expression, so the value may itself
    /// contain operator characters (`note=a>=b`).
    pub fn parse(expr: &str) -> Result<Self, FilterError> {
        const WORD_OPS: [Operator; 3] = [Operator::Between, Operator::Like, Operator::In];
        const SYMBOL_OPS: [&str; 7] = [">=", "<=", "!=", "<>", "=", ">", "<"];

        let upper = expr.to_ascii_uppercase();
        let mut found: Vec<(usize, usize, Operator)> = Vec::new();
        for op in WORD_OPS {
            let needle = format!(" {} ", op.sql_symbol());
            if let Some(pos) = upper.find(&needle) {
                found.push((pos, needle.len(), op));
            }
        }
        for symbol in SYMBOL_OPS {
            if let Some(pos) = expr.find(symbol) {
                found.push((pos, symbol.len(), symbol.parse()?));
            }
        }

        // leftmost wins; at the same position `>=` beats `>`
        let (pos, len, op) = found
            .into_iter()
            .min_by_key(|&(pos, len, _)| (pos, std::cmp::Reverse(len)))
            .ok_or_else(|| FilterError::UnknownOperator(expr.trim().to_string()))?;

        let field = expr[..pos].trim();
        let value = expr[pos + len..].trim();
        Ok(Self::new(field, op, value, DataType::Text))
    }

    /// Return a copy with a different declared type.
    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
            v => v.to_string(),
        };
        write!(f, "{} {} {}", self.field, self.operator, value)
    }
}

/// Validate a filter with lenient numeric coercion.
pub fn validate(filter: &Filter) -> Result<Filter, FilterError> {
    validate_with(filter, Coercion::default())
}

/// Validate a filter against a table: the field must be one of its columns.
pub fn validate_in(filter: &Filter, table: &TableInfo, coercion: Coercion) -> Result<Filter, FilterError> {
    if filter.field.trim().is_empty() {
        return Err(FilterError::MissingField);
    }
    table.find_column(filter.field.trim())?;
    validate_with(filter, coercion)
}

/// Validate a filter and return its normalized form.
pub fn validate_with(filter: &Filter, coercion: Coercion) -> Result<Filter, FilterError> {
    let field = filter.field.trim();
    if field.is_empty() {
        return Err(FilterError::MissingField);
    }

    if !operators_for(filter.data_type).contains(&filter.operator) {
        return Err(FilterError::IncompatibleOperator {
            operator: filter.operator,
            data_type: filter.data_type,
        });
    }

    let blank = matches!(&filter.value, Value::String(s) if s.trim().is_empty());
    if filter.value.is_null() || blank {
        return Err(FilterError::missing_value(field));
    }

    let value = match filter.operator {
        Operator::In => {
            let items = split_list(&filter.value);
            if items.is_empty() {
                return Err(FilterError::missing_value(field));
            }
            Value::Array(normalize_all(field, items, filter.data_type, coercion)?)
        }
        Operator::Between => {
            let items = split_list(&filter.value);
            if items.len() != 2 {
                return Err(FilterError::unparsable(field, scalar_text(&filter.value), filter.data_type));
            }
            Value::Array(normalize_all(field, items, filter.data_type, coercion)?)
        }
        _ => normalize(field, &filter.value, filter.data_type, coercion)?,
    };

    Ok(Filter {
        field: field.to_string(),
        operator: filter.operator,
        value,
        data_type: filter.data_type,
    })
}

/// Split a list value: a JSON array, or a comma-separated string.
fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| !matches!(v, Value::String(s) if s.trim().is_empty()))
            .cloned()
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn normalize_all(
    field: &str,
    items: Vec<Value>,
    data_type: DataType,
    coercion: Coercion,
) -> Result<Vec<Value>, FilterError> {
    items
        .iter()
        .map(|v| normalize(field, v, data_type, coercion))
        .collect()
}

fn normalize(field: &str, value: &Value, data_type: DataType, coercion: Coercion) -> Result<Value, FilterError> {
    match data_type {
        DataType::Number => {
            let parsed = match value {
                Value::Number(_) => Some(value.clone()),
                Value::String(s) => number_value(s),
                _ => None,
            };
            match (parsed, coercion) {
                (Some(v), _) => Ok(v),
                (None, Coercion::Lenient) => {
                    tracing::warn!(field, value = %value, "non-numeric filter value coerced to 0");
                    Ok(Value::from(0))
                }
                (None, Coercion::Strict) => Err(FilterError::unparsable(field, scalar_text(value), data_type)),
            }
        }
        DataType::Date => match value {
            Value::String(s) if is_iso_date(s.trim()) => Ok(Value::String(s.trim().to_string())),
            _ => Err(FilterError::unparsable(field, scalar_text(value), data_type)),
        },
        DataType::Text | DataType::Enum => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(FilterError::unparsable(field, scalar_text(value), data_type)),
        },
    }
}

fn number_value(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn is_iso_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Plain text of a scalar JSON value (strings unquoted, null empty).
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_value(data_type: DataType, op: Operator) -> Value {
        match (data_type, op) {
            (DataType::Number, Operator::Between) => json!([1, 10]),
            (DataType::Date, Operator::Between) => json!(["2024-01-01", "2024-12-31"]),
            (DataType::Number, _) => json!(5),
            (DataType::Date, _) => json!("2024-03-01"),
            (_, Operator::In) => json!("a,b"),
            _ => json!("x"),
        }
    }

    #[test]
    fn test_operators_for_is_consistent_with_validate() {
        for data_type in DataType::ALL {
            let allowed = operators_for(data_type);
            assert!(!allowed.is_empty());

            for op in Operator::ALL {
                let filter = Filter::new("f", op, sample_value(data_type, op), data_type);
                let result = validate(&filter);
                if allowed.contains(&op) {
                    assert!(result.is_ok(), "{} {} rejected: {:?}", data_type, op, result);
                } else {
                    assert_eq!(
                        result,
                        Err(FilterError::IncompatibleOperator { operator: op, data_type })
                    );
                }
            }
        }
    }

    #[test]
    fn test_operator_order() {
        assert_eq!(
            operators_for(DataType::Text),
            &[Operator::Eq, Operator::Ne, Operator::Like, Operator::In]
        );
        assert_eq!(operators_for(DataType::Enum), &[Operator::Eq, Operator::Ne, Operator::In]);
    }

    #[test]
    fn test_missing_field_and_value() {
        let f = Filter::new("  ", Operator::Eq, "x", DataType::Text);
        assert_eq!(validate(&f), Err(FilterError::MissingField));

        let f = Filter::new("name", Operator::Eq, Value::Null, DataType::Text);
        assert_eq!(validate(&f), Err(FilterError::missing_value("name")));

        let f = Filter::new("name", Operator::Eq, "  ", DataType::Text);
        assert_eq!(validate(&f), Err(FilterError::missing_value("name")));

        let f = Filter::new("tag", Operator::In, " , ", DataType::Enum);
        assert_eq!(validate(&f), Err(FilterError::missing_value("tag")));
    }

    #[test]
    fn test_number_coercion() {
        let f = Filter::new("age", Operator::Gt, "42", DataType::Number);
        assert_eq!(validate(&f).unwrap().value, json!(42));

        let f = Filter::new("price", Operator::Lte, "9.5", DataType::Number);
        assert_eq!(validate(&f).unwrap().value, json!(9.5));

        let f = Filter::new("age", Operator::Gt, "abc", DataType::Number);
        assert_eq!(validate(&f).unwrap().value, json!(0));

        assert_eq!(
            validate_with(&f, Coercion::Strict),
            Err(FilterError::unparsable("age", "abc", DataType::Number))
        );
    }

    #[test]
    fn test_list_values() {
        let f = Filter::new("status", Operator::In, "new, open ,", DataType::Enum);
        assert_eq!(validate(&f).unwrap().value, json!(["new", "open"]));

        let f = Filter::new("id", Operator::In, json!(["1", 2]), DataType::Number);
        assert_eq!(validate(&f).unwrap().value, json!([1, 2]));

        let f = Filter::new("price", Operator::Between, "1,5", DataType::Number);
        assert_eq!(validate(&f).unwrap().value, json!([1, 5]));

        let f = Filter::new("price", Operator::Between, "1", DataType::Number);
        assert!(matches!(validate(&f), Err(FilterError::UnparsableValue { .. })));
    }

    #[test]
    fn test_date_values() {
        let f = Filter::new("created", Operator::Gte, "2024-02-29", DataType::Date);
        assert!(validate(&f).is_ok());

        let f = Filter::new("created", Operator::Gte, "2024-02-30", DataType::Date);
        assert!(matches!(validate(&f), Err(FilterError::UnparsableValue { .. })));

        let f = Filter::new("created", Operator::Lt, "2024-02-01T10:00:00Z", DataType::Date);
        assert!(validate(&f).is_ok());
    }

    #[test]
    fn test_validate_in_table() {
        let table = TableInfo::new("users").column("email", "text", false);
        let f = Filter::new("email", Operator::Like, "@x", DataType::Text);
        assert!(validate_in(&f, &table, Coercion::Lenient).is_ok());

        let f = Filter::new("emali", Operator::Like, "@x", DataType::Text);
        assert!(matches!(
            validate_in(&f, &table, Coercion::Lenient),
            Err(FilterError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_parse_expression() {
        let f = Filter::parse("age >= 30").unwrap();
        assert_eq!((f.field.as_str(), f.operator, f.value), ("age", Operator::Gte, json!("30")));

        let f = Filter::parse("name like jo").unwrap();
        assert_eq!((f.field.as_str(), f.operator), ("name", Operator::Like));

        let f = Filter::parse("status IN new,open").unwrap();
        assert_eq!(f.value, json!("new,open"));

        let f = Filter::parse("price BETWEEN 1,5").unwrap();
        assert_eq!(f.operator, Operator::Between);

        assert!(Filter::parse("nonsense").is_err());
    }

    #[test]
    fn test_parse_splits_at_leftmost_operator() {
        let f = Filter::parse("note=a>=b").unwrap();
        assert_eq!((f.field.as_str(), f.operator, f.value), ("note", Operator::Eq, json!("a>=b")));

        let f = Filter::parse("age<>5").unwrap();
        assert_eq!((f.field.as_str(), f.operator), ("age", Operator::Ne));

        let f = Filter::parse("title LIKE x=y").unwrap();
        assert_eq!((f.field.as_str(), f.operator, f.value), ("title", Operator::Like, json!("x=y")));
    }

    #[test]
    fn test_wire_format() {
        let f: Filter =
            serde_json::from_str(r#"{"field":"age","operator":">=","value":18,"type":"number"}"#).unwrap();
        assert_eq!(f, Filter::new("age", Operator::Gte, 18, DataType::Number));
        assert_eq!(
            serde_json::to_string(&f).unwrap(),
            r#"{"field":"age","operator":">=","value":18,"type":"number"}"#
        );
    }
}
