use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use eyre::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{sync::mpsc, time::sleep};

use crate::{
    config::{ConfigError, RouteConfig, loader::load_routes},
    core::reload::{ReloadHandle, ReloadRequest},
    ports::config_provider::ConfigProvider,
};

/// How long the routes file must stay quiet before a change triggers a reload.
pub const WATCH_SETTLE: Duration = Duration::from_millis(500);

/// Configuration provider that loads routes from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Request a reload once the routes file has settled after being created,
    /// modified or removed.
    ///
    /// The parent directory is watched so editors that replace the file by
    /// renaming are still noticed. Events are collapsed until none has arrived
    /// for [`WATCH_SETTLE`], so a truncate followed by a write yields a single
    /// reload of the finished file. Watching stops when the returned watcher
    /// is dropped. Must be called from within a Tokio runtime.
    pub fn watch(&self, handle: ReloadHandle) -> Result<RecommendedWatcher> {
        self.watch_with_settle(handle, WATCH_SETTLE)
    }

    pub fn watch_with_settle(
        &self,
        handle: ReloadHandle,
        settle: Duration,
    ) -> Result<RecommendedWatcher> {
        let config_filename = self
            .path
            .file_name()
            .ok_or_else(|| eyre::eyre!("Invalid routes path: {}", self.path.display()))?
            .to_owned();
        let runtime = tokio::runtime::Handle::try_current()
            .wrap_err("Watching the routes file requires a Tokio runtime")?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        if (event.kind.is_modify()
                            || event.kind.is_create()
                            || event.kind.is_remove())
                            && event
                                .paths
                                .iter()
                                .any(|p| p.file_name() == Some(&config_filename))
                        {
                            tracing::debug!("Routes file changed: {:?}", event.kind);
                            let _ = event_tx.send(());
                        }
                    }
                    Err(e) => tracing::error!("File watch error: {:?}", e),
                }
            })?;

        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .wrap_err_with(|| format!("Failed to watch {}", watch_dir.display()))?;

        runtime.spawn(forward_settled_changes(event_rx, handle, settle));

        tracing::info!(
            path = %self.path.display(),
            settle_ms = settle.as_millis() as u64,
            "Watching routes file for changes"
        );
        Ok(watcher)
    }
}

/// Turn bursts of file events into one reload request each.
///
/// Ends when the watcher is dropped or the reload worker has gone away.
async fn forward_settled_changes(
    mut events: mpsc::UnboundedReceiver<()>,
    handle: ReloadHandle,
    settle: Duration,
) {
    while events.recv().await.is_some() {
        loop {
            tokio::select! {
                event = events.recv() => {
                    if event.is_none() {
                        return;
                    }
                }
                _ = sleep(settle) => break,
            }
        }

        if !handle.request(ReloadRequest::FileChanged) {
            tracing::debug!("Reload worker gone, stopping routes file watch");
            return;
        }
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load_routes(&self) -> Result<RouteConfig, ConfigError> {
        load_routes(&self.path).await
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}
