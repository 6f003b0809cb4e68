//! Configuration loading from disk and environment.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ConfigIssue};

/// Environment variable overriding the listener port (set by hosting platforms).
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ConfigIssue>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate a TOML document.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config: ServiceConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    apply_env_overrides(&mut config, env::var(PORT_ENV).ok().as_deref());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the startup configuration: a file when given, defaults otherwise.
pub fn load_or_default(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => parse_config(""),
    }
}

/// Replace the port of the bind address with `port`, keeping the host.
fn apply_env_overrides(config: &mut ServiceConfig, port: Option<&str>) {
    let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) else {
        return;
    };

    let host = config
        .listener
        .bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("0.0.0.0");
    config.listener.bind_address = format!("{}:{}", host, port);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_override_keeps_host() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "127.0.0.1:8080".into();

        apply_env_overrides(&mut config, Some("3000"));
        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_blank_port_is_ignored() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, Some("  "));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, Some("http"));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("its-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[transform]\nmax_output_dimension = 2048\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.transform.max_output_dimension, 2048);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(parse_config("[fetch"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_config("[fetch]\ntimeout_secs = 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }
}
