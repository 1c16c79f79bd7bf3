//! Live host → target routing table.
//!
//! The table is a sequence of immutable [`RouteSnapshot`]s published through an
//! [`ArcSwap`]. Readers load the current snapshot without locking. A writer
//! builds the next snapshot completely, then swaps it in with one pointer
//! store, so a lookup sees either the old table or the new one and never a
//! mix of the two.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use arc_swap::ArcSwap;

use crate::{
    config::RouteConfig,
    core::backend::{Forwarder, RouteTarget},
};

/// One installed route.
#[derive(Debug)]
pub struct Route {
    host: String,
    target: RouteTarget,
    forwarder: Forwarder,
}

impl Route {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }
}

/// Immutable routing map as of one generation.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    routes: HashMap<String, Arc<Route>>,
    generation: u64,
}

impl RouteSnapshot {
    pub fn get(&self, host: &str) -> Option<&Arc<Route>> {
        self.routes.get(host)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Installed hosts, sorted.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<_> = self.routes.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }
}

/// Outcome of one [`RouteTable::replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub generation: u64,
    pub installed: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

/// Concurrency-safe routing table shared by the dispatcher and the reload path.
#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
    // Serializes writers and holds the last published generation.
    writer: Mutex<u64>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// An empty table at generation 0.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::default()),
            writer: Mutex::new(0),
        }
    }

    /// Resolve a host exactly as received, including any `:port` suffix.
    pub fn lookup(&self, host: &str) -> Option<Arc<Route>> {
        self.current.load().get(host).cloned()
    }

    /// A consistent view for multi-key inspection.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Install `config` as the complete routing table.
    ///
    /// Hosts absent from `config` stop resolving once this returns. When a
    /// host appears more than once the last entry wins.
    pub fn replace(&self, config: &RouteConfig) -> ReplaceSummary {
        let mut routes = HashMap::with_capacity(config.len());
        let mut dropped = 0;
        let mut duplicates = 0;

        for entry in config.entries() {
            let forwarder = match Forwarder::new(entry.target()) {
                Ok(forwarder) => forwarder,
                Err(e) => {
                    tracing::warn!(host = %entry.host(), error = %e, "Dropping unroutable target");
                    dropped += 1;
                    continue;
                }
            };

            let route = Arc::new(Route {
                host: entry.host().to_string(),
                target: entry.target().clone(),
                forwarder,
            });

            if let Some(previous) = routes.insert(entry.host().to_string(), route) {
                tracing::warn!(
                    host = %entry.host(),
                    replaced = %previous.target(),
                    target = %entry.target(),
                    "Duplicate host in routes, last entry wins"
                );
                duplicates += 1;
            }
        }

        let installed = routes.len();
        let mut generation = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.current.store(Arc::new(RouteSnapshot {
            routes,
            generation: *generation,
        }));

        ReplaceSummary {
            generation: *generation,
            installed,
            dropped,
            duplicates,
        }
    }
}
