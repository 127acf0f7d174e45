pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, LoggingConfig, RetentionConfig, RetentionPolicy, RetryConfig, S3Config,
    StorageBackendKind, StorageConfig,
};
pub use error::{Error, Result};
