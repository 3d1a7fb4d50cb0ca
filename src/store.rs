//! Template persistence boundary.
//!
//! The core only defines the template shape and the save/load transformation.
//! Stores assign `id` and timestamps. [`MemoryTemplateStore`] and
//! [`FileTemplateStore`] follow the same save rules as the HTTP collaborator:
//! a template with a known id is updated in place, anything else is inserted.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::template::ReportTemplate;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// `GET /templates`
    async fn list(&self) -> Result<Vec<ReportTemplate>, TransportError>;

    /// `POST /templates`: returns the stored template with `id` and timestamps.
    async fn save(&self, template: &ReportTemplate) -> Result<ReportTemplate, TransportError>;

    /// `DELETE /templates/{id}`, where the store supports it.
    async fn delete(&self, _id: i64) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("template deletion"))
    }
}

fn not_found() -> TransportError {
    TransportError::status(404, Some("Template not found".to_string()))
}

/// Insert or update `template` in `templates`, returning the stored copy.
fn apply_save(templates: &mut Vec<ReportTemplate>, template: &ReportTemplate) -> ReportTemplate {
    let now = Utc::now();
    let mut stored = template.clone();
    stored.updated_at = Some(now);

    if let Some(slot) = templates
        .iter_mut()
        .find(|t| t.id.is_some() && t.id == template.id)
    {
        stored.created_at = slot.created_at.or(Some(now));
        *slot = stored.clone();
        return stored;
    }

    if stored.id.is_none() {
        let next = templates.iter().filter_map(|t| t.id).max().unwrap_or(0) + 1;
        stored.id = Some(next);
    }
    stored.created_at = stored.created_at.or(Some(now));
    templates.push(stored.clone());
    stored
}

fn apply_delete(templates: &mut Vec<ReportTemplate>, id: i64) -> Result<(), TransportError> {
    let pos = templates
        .iter()
        .position(|t| t.id == Some(id))
        .ok_or_else(not_found)?;
    templates.remove(pos);
    Ok(())
}

/// Templates held in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<Vec<ReportTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn list(&self) -> Result<Vec<ReportTemplate>, TransportError> {
        Ok(self.templates.lock().await.clone())
    }

    async fn save(&self, template: &ReportTemplate) -> Result<ReportTemplate, TransportError> {
        Ok(apply_save(&mut *self.templates.lock().await, template))
    }

    async fn delete(&self, id: i64) -> Result<(), TransportError> {
        apply_delete(&mut *self.templates.lock().await, id)
    }
}

/// Templates kept in a JSON file.
#[derive(Debug)]
pub struct FileTemplateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<ReportTemplate>, TransportError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                TransportError::Decode(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, templates: &[ReportTemplate]) -> Result<(), TransportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(templates)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn list(&self) -> Result<Vec<ReportTemplate>, TransportError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn save(&self, template: &ReportTemplate) -> Result<ReportTemplate, TransportError> {
        let _guard = self.lock.lock().await;
        let mut templates = self.read().await?;
        let stored = apply_save(&mut templates, template);
        self.write(&templates).await?;
        tracing::debug!(id = ?stored.id, path = %self.path.display(), "template saved");
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> Result<(), TransportError> {
        let _guard = self.lock.lock().await;
        let mut templates = self.read().await?;
        apply_delete(&mut templates, id)?;
        self.write(&templates).await
    }
}
