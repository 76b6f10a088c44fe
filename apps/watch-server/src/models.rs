// [[VIGIL]]/apps/watch-server/src/models.rs
// Purpose: Core alert entities shared by the monitor pipeline and the store.
// Architecture: Domain Model Layer
// Dependencies: Serde, Chrono

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Error,
    Stuck,
    HelpNeeded,
    LongRunning,
    HighTokenUsage,
    AbortedRun,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Stuck => "stuck",
            Self::HelpNeeded => "help_needed",
            Self::LongRunning => "long_running",
            Self::HighTokenUsage => "high_token_usage",
            Self::AbortedRun => "aborted_run",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "error" => Some(Self::Error),
            "stuck" => Some(Self::Stuck),
            "help_needed" => Some(Self::HelpNeeded),
            "long_running" => Some(Self::LongRunning),
            "high_token_usage" => Some(Self::HighTokenUsage),
            "aborted_run" => Some(Self::AbortedRun),
            _ => None,
        }
    }
}

/// Ordered critical > high > medium > low. Rank 0 is the most severe, so
/// ascending sort on rank puts critical first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// Legacy operator-facing priority. Derived from `Severity` via a fixed
/// translation table; never persisted on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyPriority {
    Info,
    NeedsInput,
    Blocked,
    Urgent,
}

impl LegacyPriority {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "info" => Some(Self::Info),
            "needs-input" => Some(Self::NeedsInput),
            "blocked" => Some(Self::Blocked),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Urgent => Severity::Critical,
            Self::Blocked => Severity::High,
            Self::NeedsInput => Severity::Medium,
            Self::Info => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::NeedsInput => "needs-input",
            Self::Blocked => "blocked",
            Self::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub agent: AgentRef,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl Alert {
    /// Synthesize an auto alert for one session. The id embeds the synthesis
    /// millis, so re-running the pipeline yields a fresh id each time; the
    /// stable identity used for suppression is `dismissal_pattern`.
    pub fn auto(
        kind: AlertKind,
        severity: Severity,
        agent: AgentRef,
        message: String,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = format!(
            "auto-{}-{}-{}",
            agent.session_id,
            kind.as_str(),
            now.timestamp_millis()
        );
        Alert {
            id,
            kind,
            severity,
            agent,
            message,
            details,
            timestamp: now,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn legacy_priority(&self) -> LegacyPriority {
        match self.severity {
            Severity::Critical => LegacyPriority::Urgent,
            Severity::High => LegacyPriority::Blocked,
            Severity::Medium => LegacyPriority::NeedsInput,
            Severity::Low => LegacyPriority::Info,
        }
    }

    /// Mark resolved, stamping resolvedAt/resolvedBy together (or clearing
    /// them together). Keeping this as the single mutation point is what
    /// preserves the set-iff-resolved invariant.
    pub fn set_resolved(&mut self, resolved: bool, by: Option<String>, now: DateTime<Utc>) {
        self.resolved = resolved;
        if resolved {
            self.resolved_at = Some(now);
            self.resolved_by = Some(by.unwrap_or_else(|| "operator".to_string()));
        } else {
            self.resolved_at = None;
            self.resolved_by = None;
        }
    }

    /// Wire shape: the canonical record plus the derived legacy fields.
    /// Both representations come from one record, so they cannot diverge.
    pub fn to_wire(&self) -> serde_json::Value {
        let mut value = json!(self);
        if let Some(map) = value.as_object_mut() {
            map.insert("priority".to_string(), json!(self.legacy_priority()));
            map.insert("acknowledged".to_string(), json!(self.resolved));
        }
        value
    }
}

/// Derive the suppression pattern for an auto alert id: the id with its
/// trailing numeric generation segment stripped. Only ids of the shape
/// `auto-<session>-<kind>[-<digits>]`, where the kind segment names a real
/// alert kind, produce a pattern. A session id that merely ends in digits
/// therefore cannot smuggle in a bogus pattern; anything else is treated as
/// a regular persisted alert id.
pub fn dismissal_pattern(id: &str) -> Option<String> {
    let body = id.strip_prefix("auto-")?;
    let body = match body.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => body,
    };
    let (session, kind) = body.rsplit_once('-')?;
    if session.is_empty() || AlertKind::from_wire(kind).is_none() {
        return None;
    }
    Some(format!("auto-{}", body))
}
