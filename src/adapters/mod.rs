pub mod config_providers;
pub mod http_client;
pub mod http_handler;
pub mod middleware;
pub mod signals;

/// Re-export commonly used types from adapters
pub use config_providers::FileConfigProvider;
pub use http_client::HttpClientAdapter;
pub use http_handler::ReverseProxyDispatcher;
pub use middleware::cors_middleware;
