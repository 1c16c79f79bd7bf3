//! Turns SIGHUP into reload requests.
use std::io;

use crate::core::reload::{ReloadHandle, ReloadRequest};

/// Forward every SIGHUP to the reload worker until it goes away.
#[cfg(unix)]
pub async fn forward_hangups(handle: ReloadHandle) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup())?;
    tracing::info!("Listening for SIGHUP to reload routes");

    while hangups.recv().await.is_some() {
        tracing::info!("Received SIGHUP, requesting reload");
        if !handle.request(ReloadRequest::Signal) {
            break;
        }
    }
    Ok(())
}

/// SIGHUP does not exist here; reloads come from the file watcher only.
#[cfg(not(unix))]
pub async fn forward_hangups(_handle: ReloadHandle) -> io::Result<()> {
    std::future::pending().await
}
