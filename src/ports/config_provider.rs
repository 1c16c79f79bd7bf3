use async_trait::async_trait;

use crate::config::{ConfigError, RouteConfig};

/// Source of routing configuration.
///
/// The reload path only depends on this trait, so tests can drive reloads
/// from memory instead of the filesystem.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the current routing configuration.
    ///
    /// Implementations report a document that cannot be used at all as an
    /// error and return an empty configuration when there is nothing to read.
    async fn load_routes(&self) -> Result<RouteConfig, ConfigError>;

    /// Human-readable description of where routes come from, for logs.
    fn source(&self) -> String;
}
