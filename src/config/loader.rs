//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, RuntimeMode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values set on the command line; they win over the file and the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub routes: Option<String>,
    pub bind_address: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(routes) = &self.routes {
            config.routes.spec_path = routes.clone();
        }
        if let Some(bind) = &self.bind_address {
            config.server.bind_address = bind.clone();
        }
    }
}

/// A validated config plus the environment values that were ignored.
///
/// Loading usually happens before logging is up, so the warnings are handed
/// back for the caller to log once it is.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub warnings: Vec<String>,
}

/// Read `path` (or start from defaults), overlay the environment and then
/// `overrides`, and validate the result once.
pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<LoadedConfig, ConfigError> {
    let mut config: AppConfig = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    let warnings = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(LoadedConfig { config, warnings })
}

fn log_warnings(loaded: LoadedConfig) -> AppConfig {
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }
    loaded.config
}

/// Load a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    load(Some(path), &ConfigOverrides::default()).map(log_warnings)
}

/// Defaults plus environment overrides, for running without a config file.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    load(None, &ConfigOverrides::default()).map(log_warnings)
}

/// Overlay environment variables on top of file values.
///
/// Recognised keys: `APP_ENV`, `APP_BIND_ADDRESS`, `LOG_LEVEL`,
/// `APM_ENABLED`, `APM_SERVICE_NAME`, `APM_SERVICE_HOST`. Returns a warning
/// for each value that was ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();
    if let Some(value) = lookup("APP_ENV") {
        match RuntimeMode::from_env_value(&value) {
            Some(mode) => config.server.mode = mode,
            None => warnings.push(format!(
                "Unknown APP_ENV '{value}', keeping configured mode {}",
                config.server.mode
            )),
        }
    }
    if let Some(addr) = lookup("APP_BIND_ADDRESS") {
        config.server.bind_address = addr;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(enabled) = lookup("APM_ENABLED") {
        config.observability.apm_enabled = matches!(enabled.as_str(), "1" | "true" | "TRUE");
    }
    if let Some(name) = lookup("APM_SERVICE_NAME") {
        config.observability.service_name = name;
    }
    if let Some(host) = lookup("APM_SERVICE_HOST") {
        config.observability.endpoint = Some(host);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            ("APP_ENV", "production"),
            ("APM_ENABLED", "true"),
            ("APM_SERVICE_NAME", "orders-api"),
            ("APM_SERVICE_HOST", "http://apm:8200"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert!(config.server.mode.is_production());
        assert!(config.observability.apm_enabled);
        assert_eq!(config.observability.service_name, "orders-api");
        assert_eq!(config.observability.endpoint.as_deref(), Some("http://apm:8200"));
    }

    #[test]
    fn unknown_mode_is_ignored_with_a_warning() {
        let mut config = AppConfig::default();
        let warnings =
            apply_env_overrides(&mut config, |k| (k == "APP_ENV").then(|| "qa".to_string()));
        assert_eq!(config.server.mode, RuntimeMode::Development);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'qa'"));
    }

    #[test]
    fn command_line_overrides_are_validated_not_the_file_value() {
        let path = std::env::temp_dir().join(format!("bootstrap-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[server]\nbind_address = \"nowhere\"\n").unwrap();

        let overrides = ConfigOverrides {
            routes: Some("api/other.json".to_string()),
            bind_address: Some("127.0.0.1:9000".to_string()),
        };
        let loaded = load(Some(&path), &overrides);
        let _ = fs::remove_file(&path);

        let loaded = loaded.unwrap();
        assert_eq!(loaded.config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(loaded.config.routes.spec_path, "api/other.json");
    }

    #[test]
    fn invalid_file_reports_validation_errors() {
        let path = std::env::temp_dir().join(format!("bootstrap-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[server]\nbind_address = \"nowhere\"\n").unwrap();

        let err = load_config(&path).unwrap_err();
        let _ = fs::remove_file(&path);

        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
