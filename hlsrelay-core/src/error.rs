use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation failed with {} error(s): {}", .0.len(), .0.join("; "))]
    Validation(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = Error::Validation(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(
            err.to_string(),
            "Configuration validation failed with 2 error(s): first; second"
        );
    }
}
