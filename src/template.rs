//! Template Model: named, reusable query snapshots.
//!
//! A template stores the SQL text plus the columns and filters it came from so
//! that loading it can restore the builder selections. Edits go through a
//! [`TemplateDraft`] and only reach a store on an explicit save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::filter::Filter;

/// A saved, named query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReportTemplate {
    /// A new, unsaved template.
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            sql: sql.into(),
            columns: None,
            filters: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Check the fields a store requires.
    pub fn check(&self) -> Result<(), TemplateError> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::MissingName);
        }
        if self.sql.trim().is_empty() {
            return Err(TemplateError::BlankSql);
        }
        Ok(())
    }

    /// The user-authored content, without server-assigned id and timestamps.
    pub fn content(&self) -> Self {
        Self {
            id: None,
            created_at: None,
            updated_at: None,
            ..self.clone()
        }
    }

    /// True when both templates carry the same name, SQL, columns and filters.
    pub fn same_content(&self, other: &ReportTemplate) -> bool {
        self.content() == other.content()
    }

    /// Start an edit. Nothing changes until the draft is saved.
    pub fn edit(&self) -> TemplateDraft {
        TemplateDraft {
            original: self.clone(),
            candidate: self.clone(),
        }
    }

    /// First `max_chars` characters of the SQL, with `...` when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.sql.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }

    pub fn to_json(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Serialize a template and read it back, as a save followed by a load does.
pub fn round_trip(template: &ReportTemplate) -> Result<ReportTemplate, TemplateError> {
    ReportTemplate::from_json(&template.to_json()?)
}

/// An uncommitted edit of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    original: ReportTemplate,
    candidate: ReportTemplate,
}

impl TemplateDraft {
    pub fn rename(&mut self, name: impl Into<String>) -> &mut Self {
        self.candidate.name = name.into();
        self
    }

    pub fn update_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.candidate.sql = sql.into();
        self
    }

    pub fn original(&self) -> &ReportTemplate {
        &self.original
    }

    pub fn candidate(&self) -> &ReportTemplate {
        &self.candidate
    }

    pub fn is_dirty(&self) -> bool {
        self.original != self.candidate
    }

    /// Validate and hand out the candidate for saving.
    pub fn finish(self) -> Result<ReportTemplate, TemplateError> {
        self.candidate.check()?;
        Ok(self.candidate)
    }
}

/// Local list of templates, as shown to the user.
///
/// Removal here only hides a template from the list; it does not delete it
/// from any store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateShelf {
    templates: Vec<ReportTemplate>,
}

impl TemplateShelf {
    pub fn new(templates: Vec<ReportTemplate>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[ReportTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&ReportTemplate> {
        self.templates.iter().find(|t| t.id == Some(id))
    }

    /// Find by exact name, or by id when `key` is numeric.
    pub fn find(&self, key: &str) -> Option<&ReportTemplate> {
        if let Ok(id) = key.parse::<i64>() {
            if let Some(t) = self.get(id) {
                return Some(t);
            }
        }
        self.templates.iter().find(|t| t.name == key)
    }

    /// Put a saved template in place of the one with the same id, or append it.
    pub fn upsert(&mut self, saved: ReportTemplate) {
        match self
            .templates
            .iter_mut()
            .find(|t| t.id.is_some() && t.id == saved.id)
        {
            Some(slot) => *slot = saved,
            None => self.templates.push(saved),
        }
    }

    /// Remove from the local list.
    pub fn remove(&mut self, id: i64) -> Option<ReportTemplate> {
        let pos = self.templates.iter().position(|t| t.id == Some(id))?;
        Some(self.templates.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;
    use crate::schema::DataType;
    use pretty_assertions::assert_eq;

    fn sample() -> ReportTemplate {
        ReportTemplate::new("Active adults", "SELECT id, name FROM users")
            .with_columns(vec!["id".into(), "name".into()])
            .with_filters(vec![Filter::new("age", Operator::Gte, 18, DataType::Number)])
    }

    #[test]
    fn test_round_trip_preserves_content() {
        let mut t = sample();
        t.id = Some(7);
        t.created_at = Some(Utc::now());

        let back = round_trip(&t).unwrap();
        assert_eq!(back.sql, t.sql);
        assert_eq!(back.columns, t.columns);
        assert_eq!(back.filters, t.filters);
        assert!(back.same_content(&t));
    }

    #[test]
    fn test_wire_format_matches_store() {
        let json = r#"{"id":3,"name":"n","sql":"SELECT 1","columns":null,"filters":null,
                       "created_at":"2024-05-01T10:00:00Z","updated_at":"2024-05-01T10:00:00Z"}"#;
        let t = ReportTemplate::from_json(json).unwrap();
        assert_eq!(t.id, Some(3));
        assert_eq!(t.columns, None);
        assert!(t.created_at.is_some());
    }

    #[test]
    fn test_draft_needs_explicit_save() {
        let t = sample();
        let mut draft = t.edit();
        draft.rename("Adults").update_sql("SELECT * FROM users");
        assert!(draft.is_dirty());
        assert_eq!(draft.original(), &t);

        let saved = draft.finish().unwrap();
        assert_eq!(saved.name, "Adults");
        assert_eq!(saved.columns, t.columns);

        let mut draft = t.edit();
        draft.rename("  ");
        assert!(matches!(draft.finish(), Err(TemplateError::MissingName)));
    }

    #[test]
    fn test_preview() {
        let t = ReportTemplate::new("x", "SELECT id FROM users");
        assert_eq!(t.preview(6), "SELECT...");
        assert_eq!(t.preview(100), "SELECT id FROM users");
    }

    #[test]
    fn test_shelf_upsert_and_remove() {
        let mut a = sample();
        a.id = Some(1);
        let mut shelf = TemplateShelf::new(vec![a.clone()]);

        let mut renamed = a.clone();
        renamed.name = "Renamed".into();
        shelf.upsert(renamed);
        assert_eq!(shelf.len(), 1);
        assert_eq!(shelf.get(1).unwrap().name, "Renamed");
        assert_eq!(shelf.find("Renamed").unwrap().id, Some(1));

        assert!(shelf.remove(1).is_some());
        assert!(shelf.is_empty());
    }
}
