// [[VIGIL]]/apps/watch-server/src/monitor.rs
// Purpose: Per-session alert synthesis, suppression and ranking.
// Architecture: Domain Logic Layer
// Dependencies: Futures, Chrono, Session/Transcript providers

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::{dismissal_pattern, AgentRef, Alert, AlertKind, Severity};
use crate::patterns::RuleSet;
use crate::sessions::{SessionDirectory, SessionKey, SessionMeta};
use crate::transcript::{scan_records, TranscriptSource};

/// Idle minutes before a session counts as stuck.
pub const IDLE_THRESHOLD_MIN: i64 = 30;
/// Idle minutes at which a stuck alert escalates from low to medium.
pub const IDLE_ESCALATION_MIN: i64 = 120;
/// Sessions not updated for this long produce no alerts at all.
pub const STALE_SESSION_HOURS: i64 = 24;
/// Token counts above this raise a high_token_usage alert.
pub const TOKEN_ALERT_THRESHOLD: u64 = 100_000;
/// Token counts above this escalate the alert from medium to high.
pub const TOKEN_ESCALATION_THRESHOLD: u64 = 150_000;
/// Upper bound on concurrent transcript reads across the fleet.
const SESSION_SCAN_CONCURRENCY: usize = 8;

// Severity is a pure function of the kind-specific magnitude; nothing else
// in the pipeline assigns it.

fn error_severity(count: usize) -> Severity {
    if count > 3 {
        Severity::Critical
    } else if count > 1 {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn idle_severity(idle_minutes: i64) -> Severity {
    if idle_minutes > IDLE_ESCALATION_MIN {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn token_severity(total_tokens: u64) -> Severity {
    if total_tokens > TOKEN_ESCALATION_THRESHOLD {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Ranked alerts plus the aggregate counts computed after ranking.
#[derive(Debug, Default)]
pub struct AlertDigest {
    pub alerts: Vec<Alert>,
    pub total: usize,
    pub critical_count: usize,
    pub high_count: usize,
}

/// Stable order: severity rank first (critical before low), most recent
/// timestamp as tie-break, input order preserved for full ties.
pub fn rank_alerts(alerts: &mut Vec<Alert>) {
    alerts.sort_by_key(|a| (a.severity.rank(), Reverse(a.timestamp)));
}

pub struct AlertMonitor {
    directory: Arc<dyn SessionDirectory>,
    transcripts: Arc<dyn TranscriptSource>,
    rules: RuleSet,
}

impl AlertMonitor {
    pub fn new(directory: Arc<dyn SessionDirectory>, transcripts: Arc<dyn TranscriptSource>) -> Self {
        AlertMonitor {
            directory,
            transcripts,
            rules: RuleSet::builtin(),
        }
    }

    /// Run the full pipeline: enumerate sessions, analyze each (bounded
    /// fan-out), drop candidates whose pattern is in the dismissed set, rank
    /// and count. Recomputed from scratch on every call; candidates are
    /// transient and never written back.
    pub async fn scan(&self, dismissed: &BTreeSet<String>, now: DateTime<Utc>) -> AlertDigest {
        let sessions = self.directory.list_sessions().await;
        tracing::debug!("Scanning {} session(s)", sessions.len());

        let per_session: Vec<Vec<Alert>> = stream::iter(sessions)
            .map(|(key, meta)| self.analyze_session(key, meta, now))
            .buffer_unordered(SESSION_SCAN_CONCURRENCY)
            .collect()
            .await;

        let mut alerts: Vec<Alert> = per_session
            .into_iter()
            .flatten()
            .filter(|alert| {
                match dismissal_pattern(&alert.id) {
                    Some(pattern) => !dismissed.contains(&pattern),
                    None => true,
                }
            })
            .collect();

        rank_alerts(&mut alerts);

        let critical_count = alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count();
        let high_count = alerts
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count();

        AlertDigest {
            total: alerts.len(),
            critical_count,
            high_count,
            alerts,
        }
    }

    /// Candidate alerts for one session. Stale sessions are excluded
    /// entirely; a session with no readable transcript still gets its
    /// metadata-driven alerts (aborted run, token usage).
    async fn analyze_session(&self, key: String, meta: SessionMeta, now: DateTime<Utc>) -> Vec<Alert> {
        let updated_at = DateTime::<Utc>::from_timestamp_millis(meta.updated_at);
        let fresh = updated_at
            .map(|ts| now - ts <= Duration::hours(STALE_SESSION_HOURS))
            .unwrap_or(false);
        if !fresh {
            return Vec::new();
        }

        let agent = agent_ref(&key, &meta);
        let lines = self.transcripts.tail_lines(&meta.session_id).await;
        let scan = scan_records(lines.iter().map(String::as_str));

        let mut alerts = Vec::new();

        if scan.error_count > 0 {
            alerts.push(Alert::auto(
                AlertKind::Error,
                error_severity(scan.error_count),
                agent.clone(),
                format!("{} error(s) in recent activity", scan.error_count),
                scan.last_error.clone(),
                now,
            ));
        }

        if let Some(text) = &scan.last_assistant_message {
            if let Some(rule) = self.rules.classify(text) {
                alerts.push(Alert::auto(
                    AlertKind::HelpNeeded,
                    Severity::High,
                    agent.clone(),
                    format!("Agent needs attention: {}", rule.label),
                    Some(text.clone()),
                    now,
                ));
            }
        }

        if let Some(last_activity) = scan.last_activity {
            let idle_minutes = (now - last_activity).num_minutes();
            if idle_minutes > IDLE_THRESHOLD_MIN {
                alerts.push(Alert::auto(
                    AlertKind::Stuck,
                    idle_severity(idle_minutes),
                    agent.clone(),
                    format!("No activity for {} minutes", idle_minutes),
                    None,
                    now,
                ));
            }
        }

        if meta.aborted_last_run == Some(true) {
            alerts.push(Alert::auto(
                AlertKind::AbortedRun,
                Severity::High,
                agent.clone(),
                "Last run was aborted".to_string(),
                None,
                now,
            ));
        }

        if let Some(tokens) = meta.total_tokens {
            if tokens > TOKEN_ALERT_THRESHOLD {
                alerts.push(Alert::auto(
                    AlertKind::HighTokenUsage,
                    token_severity(tokens),
                    agent,
                    format!("High token usage: {} tokens", tokens),
                    None,
                    now,
                ));
            }
        }

        alerts
    }
}

fn agent_ref(key: &str, meta: &SessionMeta) -> AgentRef {
    let parsed = SessionKey::parse(key);
    let agent_id = meta
        .agent_id
        .clone()
        .unwrap_or_else(|| parsed.namespace.clone());
    let agent_name = meta.agent_name.clone().unwrap_or_else(|| agent_id.clone());
    AgentRef {
        agent_id,
        agent_name,
        session_id: meta.session_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FakeDirectory(HashMap<String, SessionMeta>);

    #[async_trait]
    impl SessionDirectory for FakeDirectory {
        async fn list_sessions(&self) -> HashMap<String, SessionMeta> {
            self.0.clone()
        }
    }

    struct FakeTranscripts(HashMap<String, Vec<String>>);

    #[async_trait]
    impl TranscriptSource for FakeTranscripts {
        async fn tail_lines(&self, session_id: &str) -> Vec<String> {
            self.0.get(session_id).cloned().unwrap_or_default()
        }
    }

    fn meta(session_id: &str, updated_at: DateTime<Utc>) -> SessionMeta {
        SessionMeta {
            session_id: session_id.to_string(),
            updated_at: updated_at.timestamp_millis(),
            total_tokens: None,
            aborted_last_run: None,
            agent_id: None,
            agent_name: None,
        }
    }

    fn monitor_for(
        sessions: HashMap<String, SessionMeta>,
        transcripts: HashMap<String, Vec<String>>,
    ) -> AlertMonitor {
        AlertMonitor::new(
            Arc::new(FakeDirectory(sessions)),
            Arc::new(FakeTranscripts(transcripts)),
        )
    }

    fn error_line(at: DateTime<Utc>) -> String {
        format!(
            "{{\"timestamp\": {}, \"details\": {{\"status\": \"error\", \"error\": \"boom\"}}}}",
            at.timestamp_millis()
        )
    }

    fn activity_line(at: DateTime<Utc>) -> String {
        format!("{{\"timestamp\": {}}}", at.timestamp_millis())
    }

    async fn scan_single(
        meta: SessionMeta,
        lines: Vec<String>,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let session_id = meta.session_id.clone();
        let monitor = monitor_for(
            HashMap::from([("agents:host:main".to_string(), meta)]),
            HashMap::from([(session_id, lines)]),
        );
        monitor.scan(&BTreeSet::new(), now).await.alerts
    }

    #[tokio::test]
    async fn test_error_severity_monotonicity() {
        let now = Utc::now();
        for (count, expected) in [(1, Severity::Medium), (2, Severity::High), (4, Severity::Critical)] {
            let lines: Vec<String> = (0..count).map(|_| error_line(now)).collect();
            let alerts = scan_single(meta("s1", now), lines, now).await;
            let error = alerts.iter().find(|a| a.kind == AlertKind::Error).unwrap();
            assert_eq!(error.severity, expected, "count {}", count);
            assert_eq!(error.details.as_deref(), Some("boom"));
        }
    }

    #[tokio::test]
    async fn test_idle_thresholds() {
        let now = Utc::now();

        let alerts = scan_single(
            meta("s1", now),
            vec![activity_line(now - Duration::minutes(29))],
            now,
        )
        .await;
        assert!(alerts.iter().all(|a| a.kind != AlertKind::Stuck));

        let alerts = scan_single(
            meta("s1", now),
            vec![activity_line(now - Duration::minutes(31))],
            now,
        )
        .await;
        let stuck = alerts.iter().find(|a| a.kind == AlertKind::Stuck).unwrap();
        assert_eq!(stuck.severity, Severity::Low);

        let alerts = scan_single(
            meta("s1", now),
            vec![activity_line(now - Duration::minutes(121))],
            now,
        )
        .await;
        let stuck = alerts.iter().find(|a| a.kind == AlertKind::Stuck).unwrap();
        assert_eq!(stuck.severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_token_thresholds() {
        let now = Utc::now();
        let cases = [
            (99_999_u64, None),
            (100_001, Some(Severity::Medium)),
            (150_001, Some(Severity::High)),
        ];
        for (tokens, expected) in cases {
            let mut m = meta("s1", now);
            m.total_tokens = Some(tokens);
            let alerts = scan_single(m, Vec::new(), now).await;
            let found = alerts
                .iter()
                .find(|a| a.kind == AlertKind::HighTokenUsage)
                .map(|a| a.severity);
            assert_eq!(found, expected, "tokens {}", tokens);
        }
    }

    #[tokio::test]
    async fn test_stale_sessions_are_excluded() {
        let now = Utc::now();
        let mut m = meta("s1", now - Duration::hours(25));
        m.total_tokens = Some(200_000);
        m.aborted_last_run = Some(true);
        let lines = vec![error_line(now - Duration::hours(25))];
        let alerts = scan_single(m, lines, now).await;
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_dismissed_patterns_suppress_candidates() {
        let now = Utc::now();
        let monitor = monitor_for(
            HashMap::from([("agents:host:main".to_string(), meta("s1", now))]),
            HashMap::from([("s1".to_string(), vec![error_line(now)])]),
        );

        let digest = monitor.scan(&BTreeSet::new(), now).await;
        assert_eq!(digest.total, 1);

        let dismissed = BTreeSet::from(["auto-s1-error".to_string()]);
        let digest = monitor.scan(&dismissed, now).await;
        assert_eq!(digest.total, 0);
    }

    #[tokio::test]
    async fn test_end_to_end_session_scenario() {
        let now = Utc::now();
        let mut m = meta("s1", now);
        m.total_tokens = Some(160_000);
        m.aborted_last_run = Some(true);
        let lines = vec![format!(
            "{{\"timestamp\": {}, \"message\": {{\"role\": \"assistant\", \"content\": \"I cannot proceed without access\"}}}}",
            now.timestamp_millis()
        )];

        let alerts = scan_single(m, lines, now).await;
        let mut kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(
            kinds,
            vec![AlertKind::AbortedRun, AlertKind::HelpNeeded, AlertKind::HighTokenUsage]
        );
        assert!(alerts.iter().all(|a| a.severity == Severity::High));

        let help = alerts
            .iter()
            .find(|a| a.kind == AlertKind::HelpNeeded)
            .unwrap();
        assert!(help.message.contains("cannot proceed"));
        assert_eq!(
            help.details.as_deref(),
            Some("I cannot proceed without access")
        );
    }

    #[test]
    fn test_ranking_is_stable() {
        let ts = |millis| DateTime::<Utc>::from_timestamp_millis(millis).unwrap();
        let agent = AgentRef {
            agent_id: "a".to_string(),
            agent_name: "a".to_string(),
            session_id: "s".to_string(),
        };
        let make = |id: &str, severity, at| Alert {
            id: id.to_string(),
            kind: AlertKind::LongRunning,
            severity,
            agent: agent.clone(),
            message: String::new(),
            details: None,
            timestamp: at,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        };

        let mut alerts = vec![
            make("A", Severity::High, ts(10)),
            make("B", Severity::High, ts(10)),
            make("C", Severity::Critical, ts(5)),
        ];
        rank_alerts(&mut alerts);
        let order: Vec<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_digest_counts_after_ranking() {
        let now = Utc::now();
        let mut m = meta("s1", now);
        m.total_tokens = Some(160_000);
        let lines: Vec<String> = (0..4).map(|_| error_line(now)).collect();
        let monitor = monitor_for(
            HashMap::from([("agents:host:main".to_string(), m)]),
            HashMap::from([("s1".to_string(), lines)]),
        );

        let digest = monitor.scan(&BTreeSet::new(), now).await;
        assert_eq!(digest.total, 2);
        assert_eq!(digest.critical_count, 1);
        assert_eq!(digest.high_count, 1);
        // critical error first, high token usage after
        assert_eq!(digest.alerts[0].kind, AlertKind::Error);
    }
}
