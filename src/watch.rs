//! Stub file watcher for hot reload.

use crate::config::StubsConfig;
use crate::runtime::LiveStubs;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Outcome of the latest reload, `None` until the first one.
pub type ReloadStatus = watch::Receiver<Option<bool>>;

/// Watches a stub file and applies it to live state on change.
pub struct StubFileWatcher {
    path: PathBuf,
    live: Arc<LiveStubs>,
}

impl StubFileWatcher {
    pub fn new(path: &Path, live: Arc<LiveStubs>) -> Self {
        Self {
            path: path.to_path_buf(),
            live,
        }
    }

    /// Re-read the stub file and apply it.
    ///
    /// On failure stubs, error engine and settings stay as they were.
    pub fn reload(&self) -> bool {
        match StubsConfig::from_file(&self.path) {
            Ok(config) => {
                self.live.apply(&config);
                true
            }
            Err(e) => {
                error!(
                    path = ?self.path,
                    error = %e,
                    "Failed to reload stubs, keeping current set"
                );
                false
            }
        }
    }

    /// Reload and publish the outcome, replacing any unread one.
    fn reload_and_publish(&self, status: &watch::Sender<Option<bool>>) {
        status.send_replace(Some(self.reload()));
    }

    /// Start watching.
    ///
    /// Returns the underlying watcher, which must be kept alive, and a
    /// receiver holding the outcome of the latest reload.
    pub fn run(self) -> Result<(RecommendedWatcher, ReloadStatus), notify::Error> {
        let (status_tx, status_rx) = watch::channel(None);
        let path = self.path.clone();
        let handler = Arc::new(self);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        info!("Stub file change detected, reloading");
                        handler.reload_and_publish(&status_tx);
                    }
                }
                Err(e) => error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        info!(path = ?path, "Stub watcher started");
        Ok((watcher, status_rx))
    }
}
