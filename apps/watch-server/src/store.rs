// [[VIGIL]]/apps/watch-server/src/store.rs
// Purpose: Durable alert document with pattern-based dismissal.
// Architecture: Persistence Layer
// Dependencies: Serde, Tokio fs, Thiserror

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{dismissal_pattern, AgentRef, Alert, AlertKind, LegacyPriority, Severity};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Alert not found: {0}")]
    NotFound(String),
    #[error("Failed to write alerts document: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode alerts document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The persisted aggregate. `dismissedPatterns` has set semantics: resolving
/// the same pattern twice leaves one occurrence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsDocument {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub dismissed_patterns: BTreeSet<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fields an operator may patch. Absent fields are untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPatch {
    #[serde(default)]
    pub resolved: Option<bool>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
}

/// Manually created persisted alert.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: AlertKind,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub priority: Option<String>,
    pub agent: AgentRef,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Alert),
    Dismissed(String),
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Removed(Alert),
    Dismissed(String),
}

/// Whole-document read-modify-write store. Every mutation loads the entire
/// document, mutates it in memory and rewrites the file; there is no lock
/// and no version token, so concurrent writers are last-write-wins. Callers
/// needing stronger guarantees must serialize writes externally.
pub struct AlertStore {
    path: PathBuf,
}

impl AlertStore {
    pub fn new(path: PathBuf) -> Self {
        AlertStore { path }
    }

    /// Load the document, bootstrapping an empty one when the file is
    /// missing or unreadable. Read failures are never surfaced.
    pub async fn load(&self) -> AlertsDocument {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::error!("Failed to parse alerts document {:?}: {}", self.path, e);
                    AlertsDocument::default()
                }
            },
            Err(_) => {
                tracing::debug!("No alerts document at {:?}, starting empty", self.path);
                AlertsDocument::default()
            }
        }
    }

    /// Serialize and rewrite the whole document. Write failures propagate:
    /// silently losing a resolve or delete is worse than erroring.
    async fn persist(&self, doc: &mut AlertsDocument) -> Result<(), StoreError> {
        doc.last_updated = Some(Utc::now());
        let json = serde_json::to_string_pretty(doc)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Alert> {
        self.load().await.alerts.into_iter().find(|a| a.id == id)
    }

    /// PATCH semantics. An auto-shaped id being resolved does not touch
    /// `alerts` at all: the ephemeral candidate is converted into a
    /// permanent suppression rule instead.
    pub async fn update(&self, id: &str, patch: AlertPatch) -> Result<UpdateOutcome, StoreError> {
        let mut doc = self.load().await;

        if patch.resolved == Some(true) {
            if let Some(pattern) = dismissal_pattern(id) {
                if doc.dismissed_patterns.insert(pattern.clone()) {
                    tracing::info!("Dismissed auto alert pattern: {}", pattern);
                }
                self.persist(&mut doc).await?;
                return Ok(UpdateOutcome::Dismissed(pattern));
            }
        }

        let now = Utc::now();
        let alert = doc
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(raw) = &patch.priority {
            match LegacyPriority::from_wire(raw) {
                Some(priority) => alert.severity = priority.severity(),
                // Deliberate leniency: an unknown priority is ignored, not
                // rejected.
                None => tracing::warn!("Ignoring unknown priority value: {}", raw),
            }
        }
        if let Some(details) = patch.details {
            alert.details = Some(details);
        }
        if let Some(resolved) = patch.resolved {
            alert.set_resolved(resolved, patch.resolved_by, now);
        }

        let updated = alert.clone();
        self.persist(&mut doc).await?;
        Ok(UpdateOutcome::Updated(updated))
    }

    /// DELETE semantics: same id-shape branching as update, but the
    /// persisted branch removes the record entirely.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, StoreError> {
        let mut doc = self.load().await;

        if let Some(pattern) = dismissal_pattern(id) {
            doc.dismissed_patterns.insert(pattern.clone());
            self.persist(&mut doc).await?;
            return Ok(DeleteOutcome::Dismissed(pattern));
        }

        let position = doc
            .alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = doc.alerts.remove(position);
        self.persist(&mut doc).await?;
        Ok(DeleteOutcome::Removed(removed))
    }

    /// Append a manually created persisted alert.
    pub async fn create(&self, new: NewAlert) -> Result<Alert, StoreError> {
        let severity = new
            .severity
            .or_else(|| {
                new.priority
                    .as_deref()
                    .and_then(LegacyPriority::from_wire)
                    .map(|p| p.severity())
            })
            .unwrap_or(Severity::Medium);

        let alert = Alert {
            id: new.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: new.kind,
            severity,
            agent: new.agent,
            message: new.message,
            details: new.details,
            timestamp: Utc::now(),
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        };

        let mut doc = self.load().await;
        doc.alerts.push(alert.clone());
        self.persist(&mut doc).await?;
        Ok(alert)
    }
}
