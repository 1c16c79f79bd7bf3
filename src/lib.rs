//! hostgate - a host-based HTTP reverse proxy with a hot-reloadable routing table.
//!
//! Every inbound request is routed by its `Host` header alone. The routing
//! table is read from a JSON document at startup and replaced at runtime when
//! a reload is requested (SIGHUP, or a file change with `--watch`), without
//! restarting the listener and without readers ever observing a half-built
//! table.
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping the routing table and reload logic inside `core`:
//!
//! - [`config`] reads and validates the routing document and process settings
//! - [`core::RouteTable`] publishes immutable snapshots through `arc-swap`
//! - [`core::ReloadTrigger`] serializes and coalesces reload requests
//! - [`adapters::ReverseProxyDispatcher`] forwards requests to the matched backend
//!
//! The [`wol`] module backs the companion `wol-server` binary, which sends
//! Wake-on-LAN magic packets and probes host liveness.
//!
//! # Quick Example
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use hostgate::{
//!     FileConfigProvider, HttpClientAdapter, ReloadRequest, ReloadTrigger,
//!     ReverseProxyDispatcher, RouteTable,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let routes = Arc::new(RouteTable::new());
//! let provider = Arc::new(FileConfigProvider::new("routes.json"));
//! let (trigger, _handle) = ReloadTrigger::new(provider, routes.clone());
//! trigger.load(ReloadRequest::Startup).await?;
//!
//! let client = Arc::new(HttpClientAdapter::new(Duration::from_secs(30))?);
//! let dispatcher = Arc::new(ReverseProxyDispatcher::new(routes, client));
//! let app = hostgate::adapters::http_handler::router(dispatcher);
//! # let _ = app;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Library APIs return domain errors built with `thiserror`; the binaries
//! wrap them with `eyre` context.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;
pub mod wol;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{FileConfigProvider, HttpClientAdapter, ReverseProxyDispatcher},
    core::{ReloadHandle, ReloadRequest, ReloadState, ReloadTrigger, RouteTable},
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
