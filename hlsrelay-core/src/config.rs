use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Which storage provider receives the encoder output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// Copy into a public directory served by the local HTTP server
    Local,
    /// Upload to an S3-compatible object store served through a CDN
    S3,
}

impl Default for StorageBackendKind {
    fn default() -> Self {
        Self::Local
    }
}

/// Storage provider configuration
///
/// Read once when the provider is set up and treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Root that encoder hook paths are relative to
    pub working_dir: PathBuf,
    /// Directory served verbatim by the HTTP server (local backend only)
    pub public_hls_dir: PathBuf,
    /// Serving host prefix for rewritten segment URLs; empty means same-origin
    pub serving_endpoint: String,
    pub s3: S3Config,
    pub retry: RetryConfig,
    pub retention: RetentionConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            working_dir: PathBuf::from("."),
            public_hls_dir: PathBuf::from("webroot/hls"),
            serving_endpoint: String::new(),
            s3: S3Config::default(),
            retry: RetryConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Host prefix used when rewriting variant playlists for the object store.
    ///
    /// Priority: the S3 serving override, then the global serving override,
    /// then `<endpoint>/<bucket>`.
    #[must_use]
    pub fn remote_serving_host(&self) -> String {
        let host = if !self.s3.serving_endpoint.is_empty() {
            self.s3.serving_endpoint.clone()
        } else if !self.serving_endpoint.is_empty() {
            self.serving_endpoint.clone()
        } else {
            format!(
                "{}/{}",
                self.s3.endpoint.trim_end_matches('/'),
                self.s3.bucket
            )
        };
        host.trim_end_matches('/').to_string()
    }

    /// Host prefix used by the local backend (may be empty)
    #[must_use]
    pub fn local_serving_host(&self) -> String {
        self.serving_endpoint.trim_end_matches('/').to_string()
    }
}

/// S3-compatible object store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Store endpoint (e.g., "<https://s3.us-east-1.amazonaws.com>")
    pub endpoint: String,
    /// Public serving override (CDN in front of the bucket)
    pub serving_endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret: String,
    /// Canned access policy for uploaded objects; empty means "public-read"
    pub acl: String,
}

impl S3Config {
    #[must_use]
    pub fn acl_or_default(&self) -> &str {
        if self.acl.is_empty() {
            "public-read"
        } else {
            &self.acl
        }
    }
}

/// Bounded retry for remote uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per artifact, including the first one
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            min_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// How often the sweeper scans the public directory
    pub cleanup_interval_secs: u64,
    /// Segments older than this are eligible for deletion
    pub max_age_secs: u64,
    /// Keep every segment on disk for a full recording (disables the sweeper)
    pub recording_enabled: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 60,
            max_age_secs: 120,
            recording_enabled: false,
        }
    }
}

/// What happens to old segments in the public directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Periodically delete segments older than `max_age`
    Sweep { interval: Duration, max_age: Duration },
    /// Never delete; a recording needs every historical segment
    KeepFullHistory,
}

impl RetentionConfig {
    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        if self.recording_enabled {
            RetentionPolicy::KeepFullHistory
        } else {
            RetentionPolicy::Sweep {
                interval: Duration::from_secs(self.cleanup_interval_secs),
                max_age: Duration::from_secs(self.max_age_secs),
            }
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // HLSRELAY_STORAGE__S3__BUCKET, HLSRELAY_LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("HLSRELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Static checks that do not need network access.
    ///
    /// Credential validation happens when the object-store provider is set up.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(
            self.logging.format.as_str(),
            "json" | "pretty"
        ) {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                self.logging.format
            ));
        }

        let storage = &self.storage;
        if storage.retry.max_attempts == 0 {
            errors.push("storage.retry.max_attempts must be at least 1".to_string());
        }
        if storage.retry.min_delay_ms > storage.retry.max_delay_ms {
            errors.push("storage.retry.min_delay_ms must not exceed max_delay_ms".to_string());
        }
        if !storage.retention.recording_enabled && storage.retention.cleanup_interval_secs == 0 {
            errors.push("storage.retention.cleanup_interval_secs must be positive".to_string());
        }
        if storage.backend == StorageBackendKind::Local && storage.public_hls_dir.as_os_str().is_empty() {
            errors.push("storage.public_hls_dir is required for the local backend".to_string());
        }
        if storage.backend == StorageBackendKind::S3 && storage.s3.bucket.is_empty() {
            errors.push("storage.s3.bucket is required for the s3 backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.backend, StorageBackendKind::Local);
        assert_eq!(config.storage.retry.max_attempts, 4);
        assert_eq!(config.storage.retention.cleanup_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_policy_is_explicit() {
        let mut retention = RetentionConfig::default();
        assert_eq!(
            retention.policy(),
            RetentionPolicy::Sweep {
                interval: Duration::from_secs(60),
                max_age: Duration::from_secs(120),
            }
        );

        retention.recording_enabled = true;
        assert_eq!(retention.policy(), RetentionPolicy::KeepFullHistory);
    }

    #[test]
    fn test_remote_serving_host_priority() {
        let mut storage = StorageConfig::default();
        storage.s3.endpoint = "https://s3.example.com/".to_string();
        storage.s3.bucket = "live".to_string();
        assert_eq!(storage.remote_serving_host(), "https://s3.example.com/live");

        storage.serving_endpoint = "https://edge.example.com".to_string();
        assert_eq!(storage.remote_serving_host(), "https://edge.example.com");

        storage.s3.serving_endpoint = "https://cdn.example.com/".to_string();
        assert_eq!(storage.remote_serving_host(), "https://cdn.example.com");
    }

    #[test]
    fn test_acl_default() {
        let mut s3 = S3Config::default();
        assert_eq!(s3.acl_or_default(), "public-read");
        s3.acl = "private".to_string();
        assert_eq!(s3.acl_or_default(), "private");
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        config.storage.backend = StorageBackendKind::S3;
        config.storage.retry.max_attempts = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlsrelay.toml");
        std::fs::write(
            &path,
            r#"
[storage]
backend = "s3"
serving_endpoint = "https://cdn.example.com"

[storage.s3]
endpoint = "https://s3.example.com"
bucket = "live"

[storage.retention]
recording_enabled = true
"#,
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.storage.backend, StorageBackendKind::S3);
        assert_eq!(config.storage.s3.bucket, "live");
        assert_eq!(config.storage.retry.max_attempts, 4);
        assert_eq!(config.storage.retention.policy(), RetentionPolicy::KeepFullHistory);
    }
}
