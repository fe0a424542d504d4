//! Config file discovery and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use switchboard_call_engine::CallCenterConfig;

const CONFIG_DIR: &str = "switchboard";
const CONFIG_FILE: &str = "config.toml";

/// Default config location, `$XDG_CONFIG_HOME/switchboard/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load configuration from `explicit`, else the default path if it exists,
/// else built-in defaults.
///
/// An explicitly named file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<CallCenterConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = parse_config(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            tracing::debug!("Loaded config from {}", path.display());
            config
        }
        None => CallCenterConfig::default(),
    };

    Ok(config)
}

pub fn parse_config(text: &str) -> Result<CallCenterConfig> {
    let config: CallCenterConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_partial_toml() {
        let config = parse_config(
            r#"
            [dispatcher]
            operators = 4

            [server]
            bind_addr = "127.0.0.1:7000"
            idle_timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatcher.operators, 4);
        assert_eq!(config.dispatcher.max_operators, 26);
        assert_eq!(config.server.bind_addr.port(), 7000);
        assert_eq!(config.server.idle_timeout_secs, Some(30));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_invalid_limits() {
        let err = parse_config(
            r#"
            [dispatcher]
            max_operators = 3
            fallback_operators = 5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("fallback_operators"));
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/switchboard.toml"))).is_err());
    }
}
