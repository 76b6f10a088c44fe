// [[VIGIL]]/apps/watch-server/src/sessions.rs
// Purpose: Enumerates known agent sessions and their lightweight metadata.
// Architecture: Collaborator Boundary Layer
// Dependencies: Serde, Tokio fs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Main,
    Subagent,
    Cron,
    Unknown,
}

impl SessionKind {
    fn parse(raw: &str) -> Self {
        match raw {
            "main" => Self::Main,
            "subagent" => Self::Subagent,
            "cron" => Self::Cron,
            _ => Self::Unknown,
        }
    }
}

/// Structured session key: `namespace:host:type[:subId]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub namespace: String,
    pub host: String,
    pub kind: SessionKind,
    pub sub_id: Option<String>,
}

impl SessionKey {
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.splitn(4, ':');
        let namespace = parts.next().unwrap_or_default().to_string();
        let host = parts.next().unwrap_or_default().to_string();
        let kind = parts.next().map_or(SessionKind::Unknown, SessionKind::parse);
        let sub_id = parts.next().map(|s| s.to_string());
        SessionKey {
            namespace,
            host,
            kind,
            sub_id,
        }
    }
}

/// Lightweight per-session metadata, read-only to the monitor core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub session_id: String,
    /// Epoch millis of the last session update.
    pub updated_at: i64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub aborted_last_run: Option<bool>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

/// Supplies the session-key -> metadata mapping for the fleet.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn list_sessions(&self) -> HashMap<String, SessionMeta>;
}

/// Reads `sessions.json` under the configured sessions root. A missing or
/// unparseable document degrades to an empty fleet; session enumeration is
/// never a user-visible error.
pub struct FileSessionDirectory {
    sessions_file: PathBuf,
}

impl FileSessionDirectory {
    pub fn new(sessions_root: &Path) -> Self {
        FileSessionDirectory {
            sessions_file: sessions_root.join("sessions.json"),
        }
    }
}

#[async_trait]
impl SessionDirectory for FileSessionDirectory {
    async fn list_sessions(&self) -> HashMap<String, SessionMeta> {
        match tokio::fs::read_to_string(&self.sessions_file).await {
            Ok(data) => match serde_json::from_str::<HashMap<String, SessionMeta>>(&data) {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::error!(
                        "Failed to parse sessions file {:?}: {}",
                        self.sessions_file,
                        e
                    );
                    HashMap::new()
                }
            },
            Err(_) => {
                tracing::warn!(
                    "Sessions file not found at {:?}. Treating fleet as empty.",
                    self.sessions_file
                );
                HashMap::new()
            }
        }
    }
}
