//! Configuration loading

use std::path::Path;
use tracing::info;

use crate::{Config, Error, Result};

/// Default config file looked up in the current working directory
pub const DEFAULT_CONFIG_FILE: &str = "hlsrelay.toml";

/// Load configuration from config file or environment variables
///
/// Config file search order:
/// 1. explicit path (command line)
/// 2. `HLSRELAY_CONFIG_PATH` environment variable
/// 3. ./hlsrelay.toml (current working directory)
/// 4. Fall back to environment variables only
pub fn load_config(explicit_path: Option<&str>) -> Result<Config> {
    let config_path = explicit_path
        .map(str::to_string)
        .or_else(|| {
            std::env::var("HLSRELAY_CONFIG_PATH")
                .ok()
                .filter(|p| Path::new(p).exists())
        })
        .or_else(|| {
            Path::new(DEFAULT_CONFIG_FILE)
                .exists()
                .then(|| DEFAULT_CONFIG_FILE.to_string())
        });

    let config = match config_path {
        Some(path) => {
            if !Path::new(&path).exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {path}"),
                )));
            }
            eprintln!("Loading config from {path}");
            Config::from_file(&path)?
        }
        None => {
            eprintln!("No config file found, using environment variables");
            Config::from_env()?
        }
    };

    // Fail fast on misconfigurations
    config.validate().map_err(Error::Validation)?;

    info!("Configuration loaded and validated successfully");

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_missing_explicit_path() {
        let err = load_config(Some("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[storage.retry]\nmax_attempts = 0\n").unwrap();

        let err = load_config(path.to_str()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
