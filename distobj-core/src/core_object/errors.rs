/*
    errors.rs - Error types for the object store

    Every variant maps to a small positive status code; zero is success.
    Codes coming from the storage engine are forwarded verbatim through
    `ObjectError::Engine`.
*/

use thiserror::Error;

/// Status code reported for a successful operation
pub const SUCCESS: u32 = 0;

/// Errors that can occur in the object store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// Handle is not a live registry entry
    #[error("Object handle is not registered")]
    NullObject,

    /// Storage engine has been released (store closed)
    #[error("Object store is not available")]
    NullStore,

    /// Remote cache service is unreachable
    #[error("Remote cache proxy is not available")]
    NullProxy,

    /// Storage engine never opened
    #[error("Storage engine is not open")]
    StoreNotOpen,

    /// No object registered under this session id
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// A watcher is already registered for this session
    #[error("Object already watched: {0}")]
    AlreadyWatched(String),

    /// Remote cache operation returned no or a failing result
    #[error("Remote cache operation failed: {0}")]
    RemoteFetchFailed(String),

    /// Remote callback did not arrive in time
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// Stored bytes are not a valid tagged value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Status propagated unchanged from the storage engine
    #[error("Storage engine error code {code}")]
    Engine { code: u32 },
}

/// Result type for object store operations
pub type ObjectResult<T> = Result<T, ObjectError>;

impl ObjectError {
    /// Numeric status code for this error
    pub fn code(&self) -> u32 {
        match self {
            ObjectError::NullObject => 1,
            ObjectError::NullStore => 2,
            ObjectError::NullProxy => 3,
            ObjectError::StoreNotOpen => 4,
            ObjectError::ObjectNotFound(_) => 5,
            ObjectError::AlreadyWatched(_) => 6,
            ObjectError::RemoteFetchFailed(_) => 7,
            ObjectError::Timeout(_) => 8,
            ObjectError::InvalidValue(_) => 9,
            ObjectError::Engine { code } => *code,
        }
    }
}

/// Collapse a result into the wire-level status code
pub fn status_code<T>(result: &ObjectResult<T>) -> u32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_small_and_positive() {
        let errors = [
            ObjectError::NullObject,
            ObjectError::NullStore,
            ObjectError::NullProxy,
            ObjectError::StoreNotOpen,
            ObjectError::ObjectNotFound("a".into()),
            ObjectError::AlreadyWatched("a".into()),
            ObjectError::RemoteFetchFailed("a".into()),
            ObjectError::Timeout("a".into()),
            ObjectError::InvalidValue("a".into()),
        ];
        for err in &errors {
            assert!(err.code() > SUCCESS && err.code() < 16, "{err}");
        }
    }

    #[test]
    fn test_engine_code_forwarded_verbatim() {
        let err = ObjectError::Engine { code: 27 };
        assert_eq!(err.code(), 27);
        assert_eq!(err.to_string(), "Storage engine error code 27");
    }

    #[test]
    fn test_status_code() {
        assert_eq!(status_code(&Ok::<(), ObjectError>(())), SUCCESS);
        assert_eq!(status_code::<()>(&Err(ObjectError::StoreNotOpen)), 4);
    }

    #[test]
    fn test_error_display() {
        let err = ObjectError::ObjectNotFound("session-1".to_string());
        assert_eq!(err.to_string(), "Object not found: session-1");
    }
}
