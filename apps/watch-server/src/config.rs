// apps/watch-server/src/config.rs
use std::env;
use std::path::PathBuf;

const DEFAULT_STORAGE_ROOT: &str = "/app/storage";

/// Boot-time configuration. Resolved from the environment exactly once in
/// `main` and threaded into constructors; nothing deeper reads env vars.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub port: u16,
    pub sessions_dir: PathBuf,
    pub alerts_file: PathBuf,
}

impl WatchConfig {
    pub fn from_env() -> Self {
        let port = env::var("WATCH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let root = env::var("VIGIL_STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_ROOT));

        let sessions_dir = env::var("VIGIL_SESSIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| root.join("sessions"));

        let alerts_file = env::var("VIGIL_ALERTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| root.join("alerts.json"));

        WatchConfig {
            port,
            sessions_dir,
            alerts_file,
        }
    }
}
