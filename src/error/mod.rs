//! Error handling module.
//!
//! Every failure the storage layer can raise is a [`StorageError`]. Lifecycle
//! failures (construction, `connect()`) carry the structured taxonomy below;
//! errors coming out of a forwarded backend operation are the backend's own
//! errors, wrapped transparently.

pub mod codes;

pub use codes::{ErrorCategory, ErrorCode};

/// Storage-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Native client support for a backend is not available in this build.
    #[error("Backend `{backend}` requires {requirement}, which is not available")]
    MissingDependency {
        /// Backend type name.
        backend: &'static str,
        /// What is missing.
        requirement: &'static str,
    },

    /// Transport-level connection failed.
    #[error("Connect {backend} server failed: {reason}")]
    Connect {
        /// Backend type name.
        backend: &'static str,
        /// Underlying transport error.
        reason: String,
    },

    /// Authentication step rejected.
    #[error("Invalid password: {0}")]
    Auth(String),

    /// Database selection step rejected.
    #[error("Select database[{database}] failed: {reason}")]
    Select {
        /// The index that was attempted.
        database: i64,
        /// Server-side reason.
        reason: String,
    },

    /// No configuration block exists for the requested logical name.
    #[error("No storage configured under name `{0}`")]
    Config(String),

    /// The configuration block names a backend type nobody registered.
    #[error("Unknown storage backend type `{kind}` for `{name}`")]
    UnknownBackend {
        /// Logical name being resolved.
        name: String,
        /// Declared backend type.
        kind: String,
    },

    /// A configuration block failed typed validation.
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// The process-wide manager was used before it was installed.
    #[error("Storage manager has not been installed")]
    Uninitialized,

    /// A process-wide manager is already installed.
    #[error("Storage manager is already installed")]
    AlreadyInstalled,

    /// Operation against a key holding the wrong kind of value.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// Command not understood by the backend.
    #[error("Unsupported command `{0}`")]
    UnsupportedCommand(String),

    /// Command argument or stored value rejected by the backend.
    #[error("ERR {0}")]
    InvalidValue(String),

    /// Error raised by the Redis client on a forwarded operation.
    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

impl StorageError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingDependency { .. } => ErrorCode::MISSING_DEPENDENCY,
            Self::Connect { .. } => ErrorCode::CONNECT_FAILED,
            Self::Auth(_) => ErrorCode::AUTH_FAILED,
            Self::Select { .. } => ErrorCode::SELECT_FAILED,
            Self::Config(_) => ErrorCode::CONFIG_NOT_FOUND,
            Self::UnknownBackend { .. } => ErrorCode::UNKNOWN_BACKEND,
            Self::InvalidConfig(_) => ErrorCode::INVALID_CONFIG,
            Self::Uninitialized => ErrorCode::UNINITIALIZED,
            Self::AlreadyInstalled => ErrorCode::ALREADY_INSTALLED,
            Self::WrongType => ErrorCode::WRONG_TYPE,
            Self::UnsupportedCommand(_) => ErrorCode::UNSUPPORTED_COMMAND,
            Self::InvalidValue(_) => ErrorCode::INVALID_VALUE,
            #[cfg(feature = "redis")]
            Self::Redis(_) => ErrorCode::BACKEND_ERROR,
        }
    }

    /// Whether the error was raised while establishing a connection.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Auth(_) | Self::Select { .. }
        )
    }
}

/// Result type alias using `StorageError`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StorageError::Config("cache".to_string()).error_code(),
            ErrorCode::CONFIG_NOT_FOUND
        );
        assert_eq!(
            StorageError::Auth("denied".to_string()).error_code(),
            ErrorCode::AUTH_FAILED
        );
        assert_eq!(
            StorageError::Uninitialized.error_code().category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_select_error_names_index() {
        let err = StorageError::Select {
            database: 42,
            reason: "ERR DB index is out of range".to_string(),
        };
        assert!(err.to_string().contains("[42]"));
        assert!(err.is_connection_error());
        assert!(!StorageError::WrongType.is_connection_error());
    }
}
