//! Error handling for aclib.

use std::fmt;

/// The main error type for aclib operations.
#[derive(Debug)]
pub enum Error {
    /// Generic error with a message.
    Generic(String),
    /// IO error wrapper.
    Io(std::io::Error),
    /// Invalid option registration or option mapping.
    Spec(String),
    /// A supplied value did not match the option's declared type.
    Validation {
        /// Dotted name of the offending option.
        option: String,
        /// Human-readable expected type.
        expected: String,
        /// What went wrong.
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Generic(msg) => write!(f, "{}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Spec(msg) => write!(f, "Spec error: {}", msg),
            Error::Validation {
                option,
                expected,
                message,
            } => write!(
                f,
                "Invalid value for --{}: {} (expected type {})",
                option, message, expected
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A Result type alias for aclib operations.
pub type Result<T> = std::result::Result<T, Error>;
