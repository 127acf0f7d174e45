use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Invalid or unusable backend configuration; fatal at setup
    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage provider used before setup")]
    NotInitialized,

    #[error("Invalid artifact path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Retry budget exhausted; the artifact was not written
    #[error("Giving up on {path:?} after {attempts} attempts: {source}")]
    GivingUp {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode playlist {path:?}: {reason}")]
    ManifestDecode { path: PathBuf, reason: String },

    #[error("Playlist {path:?} is a master playlist, expected a variant playlist")]
    NotAVariantPlaylist { path: PathBuf },

    #[error("Failed to encode playlist {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Configuration errors abort startup instead of degrading silently
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The artifact will not be retried automatically
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::GivingUp { .. })
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let error = StorageError::GivingUp {
            path: PathBuf::from("hls/0/seg1.ts"),
            attempts: 4,
            source: io::Error::new(io::ErrorKind::TimedOut, "timeout"),
        };
        assert_eq!(
            error.to_string(),
            "Giving up on \"hls/0/seg1.ts\" after 4 attempts: timeout"
        );
        assert!(error.is_terminal());
        assert!(!error.is_fatal());

        let error = StorageError::Config("missing bucket".to_string());
        assert_eq!(error.to_string(), "Storage configuration error: missing bucket");
        assert!(error.is_fatal());
    }
}
