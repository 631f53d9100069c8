//! Error code constants.
//!
//! Error codes are organized by category:
//! - 1xxx: Configuration errors
//! - 2xxx: Authentication errors
//! - 4xxx: Resource errors
//! - 5xxx: Internal/System errors

/// Error code type with semantic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    // ===== Configuration Errors (1xxx) =====

    /// No configuration block for the logical name.
    pub const CONFIG_NOT_FOUND: Self = Self(1001);

    /// Backend type has no registered implementation.
    pub const UNKNOWN_BACKEND: Self = Self(1002);

    /// Configuration block failed validation.
    pub const INVALID_CONFIG: Self = Self(1003);

    /// Backend support compiled out of this build.
    pub const MISSING_DEPENDENCY: Self = Self(1004);

    // ===== Authentication Errors (2xxx) =====

    /// Authentication rejected by the backend.
    pub const AUTH_FAILED: Self = Self(2001);

    // ===== Resource Errors (4xxx) =====

    /// Database selection rejected.
    pub const SELECT_FAILED: Self = Self(4001);

    /// Value of the wrong kind stored under a key.
    pub const WRONG_TYPE: Self = Self(4002);

    /// Command not understood by the backend.
    pub const UNSUPPORTED_COMMAND: Self = Self(4003);

    /// Argument or stored value rejected by the backend.
    pub const INVALID_VALUE: Self = Self(4004);

    // ===== Internal/System Errors (5xxx) =====

    /// Transport connection failed.
    pub const CONNECT_FAILED: Self = Self(5001);

    /// Error propagated from the backend client.
    pub const BACKEND_ERROR: Self = Self(5002);

    /// Process-wide manager not installed.
    pub const UNINITIALIZED: Self = Self(5003);

    /// Process-wide manager installed twice.
    pub const ALREADY_INSTALLED: Self = Self(5004);

    /// Get the error code as an i32.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Get the category of this error code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.0 {
            1000..=1999 => ErrorCategory::Configuration,
            2000..=2999 => ErrorCategory::Authentication,
            4000..=4999 => ErrorCategory::Resource,
            5000..=5999 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

/// Error category based on error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration-related errors (1xxx).
    Configuration,
    /// Authentication errors (2xxx).
    Authentication,
    /// Resource errors (4xxx).
    Resource,
    /// Internal/system errors (5xxx).
    Internal,
    /// Unknown category.
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Authentication => write!(f, "authentication"),
            Self::Resource => write!(f, "resource"),
            Self::Internal => write!(f, "internal"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::CONFIG_NOT_FOUND.as_i32(), 1001);
        assert_eq!(ErrorCode::AUTH_FAILED.as_i32(), 2001);
        assert_eq!(ErrorCode::SELECT_FAILED.as_i32(), 4001);
        assert_eq!(ErrorCode::CONNECT_FAILED.as_i32(), 5001);
        assert_eq!(i32::from(ErrorCode::UNINITIALIZED), 5003);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::UNKNOWN_BACKEND.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ErrorCode::AUTH_FAILED.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(ErrorCode::WRONG_TYPE.category(), ErrorCategory::Resource);
        assert_eq!(
            ErrorCode::CONNECT_FAILED.category(),
            ErrorCategory::Internal
        );
        assert_eq!(ErrorCategory::Resource.to_string(), "resource");
    }
}
