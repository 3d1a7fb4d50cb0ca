//! Table and column descriptors from schema introspection.
//!
//! Descriptors are immutable once fetched. `TableInfo::find_column` is the
//! lookup the builder uses to check that filters reference real columns.
//!
//! # Example
//! ```
//! use reportkit::schema::{DataType, TableInfo};
//!
//! let json = r#"{
//!     "name": "users",
//!     "columns": [
//!         { "name": "id", "type": "integer", "nullable": false },
//!         { "name": "email", "type": "character varying", "nullable": true }
//!     ]
//! }"#;
//!
//! let table: TableInfo = serde_json::from_str(json).unwrap();
//! assert_eq!(table.columns[0].data_type(), DataType::Number);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strsim::levenshtein;

use crate::error::FilterError;

/// The declared type of a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Number,
    Date,
    Enum,
}

impl DataType {
    /// All data types, in display order.
    pub const ALL: [DataType; 4] = [DataType::Text, DataType::Number, DataType::Date, DataType::Enum];

    /// Map a database type name to a filter data type.
    ///
    /// Accepts both `information_schema.columns.data_type` spellings
    /// (`character varying`, `timestamp without time zone`) and short
    /// `udt_name`/SQLite spellings (`int4`, `REAL`).
    pub fn from_sql_type(sql_type: &str) -> Self {
        let t = sql_type.trim().to_ascii_lowercase();
        if t.starts_with("interval") {
            return DataType::Text;
        }
        if t == "user-defined" || t.starts_with("enum") {
            return DataType::Enum;
        }
        if t.starts_with("date") || t.starts_with("time") {
            return DataType::Date;
        }
        let numeric = [
            "int", "tinyint", "smallint", "bigint", "serial", "numeric", "decimal", "real", "double", "float",
            "money",
        ];
        if numeric.iter().any(|n| t.starts_with(n)) {
            return DataType::Number;
        }
        DataType::Text
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text => write!(f, "text"),
            DataType::Number => write!(f, "number"),
            DataType::Date => write!(f, "date"),
            DataType::Enum => write!(f, "enum"),
        }
    }
}

impl FromStr for DataType {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(DataType::Text),
            "number" => Ok(DataType::Number),
            "date" => Ok(DataType::Date),
            "enum" => Ok(DataType::Enum),
            other => Err(FilterError::UnknownType(other.to_string())),
        }
    }
}

/// A column of a table, as reported by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Raw database type name.
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable,
        }
    }

    pub fn data_type(&self) -> DataType {
        DataType::from_sql_type(&self.sql_type)
    }
}

/// A table and its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column (builder style).
    pub fn column(mut self, name: &str, sql_type: &str, nullable: bool) -> Self {
        self.columns.push(ColumnInfo::new(name, sql_type, nullable));
        self
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Look up a column, suggesting a close name when it is missing.
    pub fn find_column(&self, name: &str) -> Result<&ColumnInfo, FilterError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FilterError::UnknownColumn {
                field: name.to_string(),
                table: self.name.clone(),
                suggestion: did_you_mean(name, self.columns.iter().map(|c| c.name.as_str())),
            })
    }
}

/// Find the best match with a length-scaled Levenshtein threshold.
fn did_you_mean<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };

    let mut best: Option<(usize, &str)> = None;
    for cand in candidates {
        let dist = levenshtein(input, cand);
        if dist <= threshold && best.is_none_or(|(d, _)| dist < d) {
            best = Some((dist, cand));
        }
    }
    best.map(|(_, name)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(DataType::from_sql_type("integer"), DataType::Number);
        assert_eq!(DataType::from_sql_type("int4"), DataType::Number);
        assert_eq!(DataType::from_sql_type("double precision"), DataType::Number);
        assert_eq!(DataType::from_sql_type("NUMERIC(10,2)"), DataType::Number);
        assert_eq!(DataType::from_sql_type("timestamp without time zone"), DataType::Date);
        assert_eq!(DataType::from_sql_type("date"), DataType::Date);
        assert_eq!(DataType::from_sql_type("USER-DEFINED"), DataType::Enum);
        assert_eq!(DataType::from_sql_type("character varying"), DataType::Text);
        assert_eq!(DataType::from_sql_type("boolean"), DataType::Text);
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!("Number".parse::<DataType>().unwrap(), DataType::Number);
        assert!(matches!("blob".parse::<DataType>(), Err(FilterError::UnknownType(_))));
    }

    #[test]
    fn test_find_column_suggests() {
        let users = TableInfo::new("users")
            .column("id", "integer", false)
            .column("email", "text", true);

        assert!(users.find_column("email").is_ok());

        match users.find_column("emial") {
            Err(FilterError::UnknownColumn { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("email"))
            }
            other => panic!("unexpected: {:?}", other),
        }

        match users.find_column("zz") {
            Err(FilterError::UnknownColumn { suggestion, .. }) => assert_eq!(suggestion, None),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
