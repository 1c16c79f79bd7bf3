use std::{
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value;

use crate::config::models::{RouteConfig, RoutesDocument};

/// Errors raised while reading the routing document
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read at all
    #[error("Failed to read routes file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was read but is not a routing document
    #[error("Malformed routes file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Whether this error must stop the process.
    ///
    /// An unreadable file degrades to an empty table; a malformed one is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::Malformed { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Unreadable { path, .. } | ConfigError::Malformed { path, .. } => path,
        }
    }
}

/// Parse a routing document from raw bytes.
///
/// The top level must be a JSON object. Entries inside `routes` are validated
/// one by one; invalid ones end up in [`RouteConfig::rejected`].
pub fn parse_routes(path: &Path, bytes: &[u8]) -> Result<RouteConfig, ConfigError> {
    let malformed = |source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    };

    let object = serde_json::from_slice::<serde_json::Map<String, Value>>(bytes).map_err(malformed)?;
    let document = RoutesDocument::deserialize(Value::Object(object)).map_err(malformed)?;

    Ok(RouteConfig::from(&document))
}

/// Read and parse the routing document, failing on any I/O error.
pub async fn read_routes(path: impl AsRef<Path>) -> Result<RouteConfig, ConfigError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let config = parse_routes(path, &bytes)?;

    for entry in config.entries() {
        tracing::info!(host = %entry.host(), target = %entry.target(), "Loaded route");
    }
    for rejected in config.rejected() {
        tracing::warn!(
            host = %rejected.host,
            target = %rejected.target,
            error = %rejected.reason,
            "Skipping invalid route"
        );
    }

    Ok(config)
}

/// Load the routing document the way the proxy does at startup and on reload.
///
/// A file that cannot be read yields an empty configuration; only a
/// malformed document is reported as an error.
pub async fn load_routes(path: impl AsRef<Path>) -> Result<RouteConfig, ConfigError> {
    match read_routes(path).await {
        Err(err @ ConfigError::Unreadable { .. }) => {
            tracing::warn!(error = %err, "Routes file unavailable, starting with no routes");
            Ok(RouteConfig::empty())
        }
        other => other,
    }
}
