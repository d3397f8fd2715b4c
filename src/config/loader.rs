//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Server list error: {0}")]
    ServerList(#[from] serde_json::Error),

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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML file without validating it.
///
/// Used when later overrides (command line, server list) still need to be applied.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load an ordered backend list from a JSON array of address strings.
pub fn load_server_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_server_list(&content)
}

/// Parse a JSON array of backend address strings.
pub fn parse_server_list(content: &str) -> Result<Vec<String>, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sticky-lb-{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_server_list() {
        let servers = parse_server_list(r#"["http://localhost:8081", "http://localhost:8082"]"#).unwrap();
        assert_eq!(servers, vec!["http://localhost:8081", "http://localhost:8082"]);

        assert!(matches!(parse_server_list(r#"{"a": 1}"#), Err(ConfigError::ServerList(_))));
    }

    #[test]
    fn test_load_config_validates() {
        let path = temp_file("invalid.toml", "backends = []\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors == &[ValidationError::NoBackends]));
        assert!(err.to_string().contains("at least one backend"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_config() {
        let path = temp_file(
            "valid.toml",
            "backends = [\"http://127.0.0.1:8081\"]\n[listener]\nbind_address = \"127.0.0.1:8000\"\n",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.backends, vec!["http://127.0.0.1:8081"]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_validation_message_lists_every_error() {
        let err = ConfigError::Validation(vec![
            ValidationError::NoBackends,
            ValidationError::ZeroProbeInterval,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: at least one backend is required, \
             health_check.interval_secs must be greater than zero"
        );
    }

    #[test]
    fn test_parse_error_converts() {
        let path = temp_file("broken.toml", "backends = [\n");
        assert!(matches!(read_config(&path), Err(ConfigError::Parse(_))));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_file() {
        let err = load_server_list(Path::new("/nonexistent/serverlist.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
