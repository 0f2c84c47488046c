//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    FileReadError(String),

    #[error("Failed to write configuration file: {0}")]
    FileWriteError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    /// An environment override that does not parse
    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid_env(var: &'static str, reason: impl ToString) -> Self {
        ConfigError::InvalidEnv {
            var,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_env_names_variable() {
        let err = ConfigError::invalid_env("DISTOBJ_CACHE_TIMEOUT", "expected number");
        assert_eq!(
            err.to_string(),
            "Invalid value for DISTOBJ_CACHE_TIMEOUT: expected number"
        );
    }
}
