// [[VIGIL]]/apps/watch-server/src/server/mod.rs
// Purpose: Shared handler state wiring the monitor and the store.
// Architecture: API Layer
// Dependencies: Monitor, Store

pub mod handlers;

use std::sync::Arc;

use crate::config::WatchConfig;
use crate::monitor::AlertMonitor;
use crate::sessions::FileSessionDirectory;
use crate::store::AlertStore;
use crate::transcript::FileTranscriptSource;

pub struct WatchState {
    pub monitor: AlertMonitor,
    pub store: AlertStore,
}

impl WatchState {
    pub fn new(config: &WatchConfig) -> Self {
        let directory = Arc::new(FileSessionDirectory::new(&config.sessions_dir));
        let transcripts = Arc::new(FileTranscriptSource::new(config.sessions_dir.clone()));
        WatchState {
            monitor: AlertMonitor::new(directory, transcripts),
            store: AlertStore::new(config.alerts_file.clone()),
        }
    }
}
