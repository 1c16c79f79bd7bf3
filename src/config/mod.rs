pub mod loader;
pub mod models;
pub mod settings;
pub mod validation;

pub use loader::{ConfigError, load_routes, parse_routes, read_routes};
pub use models::*;
pub use settings::{LogFormat, ProxySettings, SettingsError, load_settings};
pub use validation::{ValidationError, ValidationResult, validate_route};
