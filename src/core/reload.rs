//! Reload orchestration.
//!
//! Reload requests from any source (startup, SIGHUP, file watcher) funnel into
//! a bounded channel of capacity one. A single worker drains it, loads the
//! configuration and replaces the routing table, so reloads never overlap and
//! a burst of requests costs one load.
use std::{fmt, sync::Arc};

use tokio::sync::{mpsc, watch};

use crate::{
    config::ConfigError,
    core::route_table::RouteTable,
    ports::config_provider::ConfigProvider,
};

/// Why a reload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadRequest {
    Startup,
    Signal,
    FileChanged,
    Manual,
}

impl fmt::Display for ReloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ReloadRequest::Startup => "startup",
            ReloadRequest::Signal => "signal",
            ReloadRequest::FileChanged => "file-changed",
            ReloadRequest::Manual => "manual",
        };
        f.write_str(reason)
    }
}

/// Observable state of the reload worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// No configuration has been installed yet
    Uninitialized,
    /// A configuration is installed
    Loaded { generation: u64, routes: usize },
    /// A fatal configuration error stopped the worker
    Terminated,
}

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Cheap, cloneable handle for requesting reloads and observing their outcome.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    requests: mpsc::Sender<ReloadRequest>,
    state: watch::Receiver<ReloadState>,
}

impl ReloadHandle {
    /// Ask for a reload without waiting for it.
    ///
    /// Returns `false` once the worker has gone away. A request made while
    /// another one is already pending is folded into it.
    pub fn request(&self, reason: ReloadRequest) -> bool {
        match self.requests.try_send(reason) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(%reason, "Reload already pending, coalescing");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn state(&self) -> ReloadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReloadState> {
        self.state.clone()
    }
}

/// The reload worker.
pub struct ReloadTrigger {
    provider: Arc<dyn ConfigProvider>,
    routes: Arc<RouteTable>,
    requests: mpsc::Receiver<ReloadRequest>,
    state: watch::Sender<ReloadState>,
}

impl ReloadTrigger {
    pub fn new(provider: Arc<dyn ConfigProvider>, routes: Arc<RouteTable>) -> (Self, ReloadHandle) {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(ReloadState::Uninitialized);

        let trigger = Self {
            provider,
            routes,
            requests: request_rx,
            state: state_tx,
        };
        let handle = ReloadHandle {
            requests: request_tx,
            state: state_rx,
        };
        (trigger, handle)
    }

    /// Load the configuration once and install it.
    ///
    /// On a fatal error the state moves to [`ReloadState::Terminated`] and the
    /// routing table is left as it was.
    pub async fn load(&self, reason: ReloadRequest) -> Result<ReloadState, ReloadError> {
        tracing::info!(%reason, source = %self.provider.source(), "Reloading routes");

        let config = match self.provider.load_routes().await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(%reason, error = %e, "Failed to load routes");
                self.state.send_replace(ReloadState::Terminated);
                return Err(e.into());
            }
        };

        let summary = self.routes.replace(&config);
        tracing::info!(
            %reason,
            generation = summary.generation,
            routes = summary.installed,
            skipped = config.rejected().len() + summary.dropped,
            duplicates = summary.duplicates,
            "Routes installed"
        );

        let state = ReloadState::Loaded {
            generation: summary.generation,
            routes: summary.installed,
        };
        self.state.send_replace(state);
        Ok(state)
    }

    /// Serve reload requests until every [`ReloadHandle`] is dropped.
    pub async fn run(mut self) -> Result<(), ReloadError> {
        while let Some(first) = self.requests.recv().await {
            let mut coalesced = 0usize;
            while self.requests.try_recv().is_ok() {
                coalesced += 1;
            }
            if coalesced > 0 {
                tracing::debug!(coalesced, "Merged pending reload requests");
            }

            self.load(first).await?;
        }

        tracing::debug!("Reload channel closed, worker exiting");
        Ok(())
    }
}
