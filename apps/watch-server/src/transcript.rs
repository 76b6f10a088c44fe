// [[VIGIL]]/apps/watch-server/src/transcript.rs
// Purpose: Reads the bounded tail of a session's activity log and extracts
//          structured signals (timestamps, error markers, assistant text).
// Architecture: Infrastructure Helper Layer
// Dependencies: Serde, Chrono, Tokio fs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

/// At most this many of the most recent records are scanned per session.
pub const TAIL_LIMIT: usize = 100;

/// Structured signals from one session's recent activity.
#[derive(Debug, Default, Clone)]
pub struct TranscriptScan {
    pub last_activity: Option<DateTime<Utc>>,
    pub error_count: usize,
    pub last_error: Option<String>,
    pub last_assistant_message: Option<String>,
}

// Recognized record shape. Every field is optional; a line that deserializes
// to something else entirely is skipped by the scanner.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    details: Option<RecordDetails>,
    #[serde(default)]
    message: Option<RecordMessage>,
}

#[derive(Debug, Deserialize)]
struct RecordDetails {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

/// Timestamps arrive either as epoch millis or as an RFC3339 string,
/// depending on which producer wrote the record.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// Assistant content is either a plain string or a list of typed blocks;
/// only `text` blocks contribute.
fn message_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}

/// Scan raw JSONL lines (oldest first) into signals. A line that fails to
/// parse is skipped; it never aborts the scan.
pub fn scan_records<'a>(lines: impl IntoIterator<Item = &'a str>) -> TranscriptScan {
    let mut scan = TranscriptScan::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: RawRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Skipping malformed activity record: {}", e);
                continue;
            }
        };

        if let Some(ts) = record.timestamp.as_ref().and_then(parse_timestamp) {
            scan.last_activity = Some(scan.last_activity.map_or(ts, |prev| prev.max(ts)));
        }

        if let Some(details) = &record.details {
            let errored =
                details.status.as_deref() == Some("error") || details.error.is_some();
            if errored {
                scan.error_count += 1;
                if let Some(msg) = &details.error {
                    scan.last_error = Some(msg.clone());
                }
            }
        }

        if let Some(message) = &record.message {
            if message.role.as_deref() == Some("assistant") {
                if let Some(text) = message.content.as_ref().and_then(message_text) {
                    scan.last_assistant_message = Some(text);
                }
            }
        }
    }

    scan
}

/// Supplies the ordered recent activity records for a session id.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn tail_lines(&self, session_id: &str) -> Vec<String>;
}

/// Reads `<transcripts_dir>/<session_id>.jsonl`. A missing or unreadable log
/// is "no data", not an error to surface.
pub struct FileTranscriptSource {
    transcripts_dir: PathBuf,
}

impl FileTranscriptSource {
    pub fn new(transcripts_dir: PathBuf) -> Self {
        FileTranscriptSource { transcripts_dir }
    }
}

#[async_trait]
impl TranscriptSource for FileTranscriptSource {
    async fn tail_lines(&self, session_id: &str) -> Vec<String> {
        // Session ids become file names; reject anything that could escape
        // the transcripts directory.
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            tracing::warn!("Rejected suspicious session id: {}", session_id);
            return Vec::new();
        }

        let path = self.transcripts_dir.join(format!("{}.jsonl", session_id));
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let lines: Vec<&str> = data.lines().collect();
                let start = lines.len().saturating_sub(TAIL_LIMIT);
                lines[start..].iter().map(|l| l.to_string()).collect()
            }
            Err(e) => {
                tracing::debug!("No transcript for session {}: {}", session_id, e);
                Vec::new()
            }
        }
    }
}
