//! Periodic expiry of idle sessions and their staged files.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assets::AssetStore;
use crate::session::store::SessionStore;

/// Sweep schedule.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Idle threshold beyond which a session is expired.
    pub max_idle: Duration,
    /// How often the sweep runs.
    pub interval: Duration,
    pub enabled: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(6 * 3600),
            interval: Duration::from_secs(3600),
            enabled: true,
        }
    }
}

/// What one sweep pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub sessions_removed: usize,
    pub files_removed: usize,
}

/// Background task that expires idle sessions and deletes the temp files
/// they staged. Deletions are idempotent; a file already gone is not an
/// error (per-request cleanup may have raced the sweep).
pub struct SessionSweeper {
    sessions: Arc<SessionStore>,
    assets: Arc<AssetStore>,
    config: SweeperConfig,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionStore>, assets: Arc<AssetStore>, config: SweeperConfig) -> Self {
        Self {
            sessions,
            assets,
            config,
        }
    }

    /// Spawn the hourly sweep loop. Returns `None` when disabled.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!("Session sweep disabled");
            return None;
        }
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_idle_secs = self.config.max_idle.as_secs(),
            "Session sweep started"
        );
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            // The first tick fires immediately; skip it so a fresh start
            // does not sweep before anything can be idle.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let outcome = self.prune_once().await;
                if outcome != SweepOutcome::default() {
                    info!(
                        sessions = outcome.sessions_removed,
                        files = outcome.files_removed,
                        "Sweep removed idle state"
                    );
                }
            }
        }))
    }

    /// One sweep pass: expire idle sessions, delete their staged files,
    /// then clear orphaned temp files older than the idle threshold.
    pub async fn prune_once(&self) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for (chat_id, staged) in self.sessions.remove_idle(self.config.max_idle).await {
            outcome.sessions_removed += 1;
            for path in staged {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => outcome.files_removed += 1,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        debug!(chat_id, path = %path.display(), "Staged file already gone");
                    }
                    Err(err) => {
                        warn!(chat_id, path = %path.display(), error = %err, "Failed to delete staged file");
                    }
                }
            }
        }

        match self.assets.sweep(self.config.max_idle).await {
            Ok(report) => outcome.files_removed += report.removed,
            Err(err) => warn!(error = %err, "Temp directory sweep failed"),
        }

        outcome
    }
}
