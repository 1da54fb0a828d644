//! Engine error type
//!
//! Every fallible engine operation returns [`EngineResult`]. An [`EngineError`]
//! carries a numeric [`ErrorCode`], a description, and the source location
//! where it was raised. Errors are not recovered inside the core; they
//! propagate to the application.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Numeric error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// A named resource, bucket, bone, node or object does not exist
    ItemNotFound = 1,
    /// The caller passed a semantically invalid value
    InvalidParams = 2,
    /// The operation is not valid for the object's current configuration
    InvalidState = 3,
    /// An internal invariant was violated
    AssertionFailed = 4,
    /// A file could not be found in any search location
    FileNotFound = 5,
    /// A file could not be written
    CannotWriteToFile = 6,
    /// Any other I/O failure
    Io = 7,
    /// Malformed asset or configuration data
    Parse = 8,
}

impl ErrorCode {
    /// Numeric value of the code
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ItemNotFound => "ERR_ITEM_NOT_FOUND",
            Self::InvalidParams => "ERR_INVALID_PARAMS",
            Self::InvalidState => "ERR_INVALID_STATE",
            Self::AssertionFailed => "ERR_RT_ASSERTION_FAILED",
            Self::FileNotFound => "ERR_FILE_NOT_FOUND",
            Self::CannotWriteToFile => "ERR_CANNOT_WRITE_TO_FILE",
            Self::Io => "ERR_IO",
            Self::Parse => "ERR_PARSE",
        };
        write!(f, "{name}({})", self.as_u32())
    }
}

/// The single error type surfaced by the engine core
#[derive(Debug, Error)]
#[error("{code}: {description} (at {location})")]
pub struct EngineError {
    code: ErrorCode,
    description: String,
    location: &'static Location<'static>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

/// Result alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create an error with an explicit code
    #[track_caller]
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// `ERR_ITEM_NOT_FOUND`
    #[track_caller]
    pub fn item_not_found(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ItemNotFound, description)
    }

    /// `ERR_INVALID_PARAMS`
    #[track_caller]
    pub fn invalid_params(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, description)
    }

    /// `ERR_INVALID_STATE`
    #[track_caller]
    pub fn invalid_state(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, description)
    }

    /// `ERR_RT_ASSERTION_FAILED`
    #[track_caller]
    pub fn assertion_failed(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::AssertionFailed, description)
    }

    /// `ERR_FILE_NOT_FOUND`
    #[track_caller]
    pub fn file_not_found(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::FileNotFound, description)
    }

    /// Malformed data
    #[track_caller]
    pub fn parse(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::Parse, description)
    }

    /// Attach an underlying cause
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Numeric category of this error
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Where the error was raised
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl From<std::io::Error> for EngineError {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData => ErrorCode::Parse,
            _ => ErrorCode::Io,
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}

impl From<ron::error::SpannedError> for EngineError {
    #[track_caller]
    fn from(error: ron::error::SpannedError) -> Self {
        Self::parse(error.to_string()).with_source(error)
    }
}

impl From<image::ImageError> for EngineError {
    #[track_caller]
    fn from(error: image::ImageError) -> Self {
        Self::parse(format!("image decode failed: {error}")).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_code_and_location() {
        let error = EngineError::item_not_found("bone 'Hand_L'");
        assert_eq!(error.code(), ErrorCode::ItemNotFound);
        assert_eq!(error.code().as_u32(), 1);
        assert!(error.location().file().ends_with("error.rs"));

        let message = error.to_string();
        assert!(message.contains("ERR_ITEM_NOT_FOUND"));
        assert!(message.contains("Hand_L"));
    }

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.mesh");
        let error: EngineError = io.into();
        assert_eq!(error.code(), ErrorCode::FileNotFound);
        assert!(std::error::Error::source(&error).is_some());
    }
}
