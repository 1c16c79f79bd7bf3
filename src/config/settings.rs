//! Process settings: defaults, then `HOSTGATE_*` environment variables.
//!
//! Command-line flags are applied on top by the binary after loading.
use std::{path::PathBuf, time::Duration};

use config::{Config, Environment};
use serde::Deserialize;

/// Environment variable prefix for process settings
pub const ENV_PREFIX: &str = "HOSTGATE";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid forward timeout '{value}': {source}")]
    Timeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable multi-line output for development
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub config: PathBuf,
    pub forward_timeout: String,
    pub watch: bool,
    pub log_format: LogFormat,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            config: PathBuf::from("routes.json"),
            forward_timeout: "30s".to_string(),
            watch: false,
            log_format: LogFormat::Json,
        }
    }
}

impl ProxySettings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn forward_timeout(&self) -> Result<Duration, SettingsError> {
        humantime::parse_duration(&self.forward_timeout).map_err(|source| {
            SettingsError::Timeout {
                value: self.forward_timeout.clone(),
                source,
            }
        })
    }
}

/// Load settings from the process environment.
pub fn load_settings() -> Result<ProxySettings, SettingsError> {
    load_settings_from(Environment::with_prefix(ENV_PREFIX))
}

pub fn load_settings_from(environment: Environment) -> Result<ProxySettings, SettingsError> {
    let settings = Config::builder()
        .add_source(environment.try_parsing(true))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let settings = load_settings_from(env(&[])).unwrap();
        assert_eq!(settings, ProxySettings::default());
        assert_eq!(settings.listen_addr(), "0.0.0.0:8000");
        assert_eq!(settings.forward_timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let settings = load_settings_from(env(&[
            ("HOSTGATE_PORT", "9100"),
            ("HOSTGATE_CONFIG", "/etc/hostgate/routes.json"),
            ("HOSTGATE_WATCH", "true"),
            ("HOSTGATE_LOG_FORMAT", "pretty"),
            ("HOSTGATE_FORWARD_TIMEOUT", "500ms"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 9100);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.config, PathBuf::from("/etc/hostgate/routes.json"));
        assert!(settings.watch);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(
            settings.forward_timeout().unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_invalid_timeout_is_reported() {
        let settings = ProxySettings {
            forward_timeout: "soon".to_string(),
            ..ProxySettings::default()
        };
        assert!(matches!(
            settings.forward_timeout(),
            Err(SettingsError::Timeout { .. })
        ));
    }
}
