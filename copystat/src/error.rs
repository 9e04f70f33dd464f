use std::error::Error;
use std::fmt;

/// Crate-wide error type.
#[derive(Debug)]
pub enum CsError {
    /// General error/failure message.
    Message(String),
    /// Invalid configuration detected at job start.
    Config(String),
    /// Underlying I/O failure.
    Io(std::io::Error),
    /// The job was interrupted by a termination signal.
    Interrupted,
}

impl Error for CsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for CsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(m) => write!(f, "{m}"),
            Self::Config(m) => write!(f, "configuration error: {m}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Interrupted => write!(f, "interrupted by signal"),
        }
    }
}

/// Useful for translating generic Err(String)'s into CsError's.
impl From<String> for CsError {
    fn from(msg: String) -> Self {
        CsError::Message(msg)
    }
}

impl From<&str> for CsError {
    fn from(msg: &str) -> Self {
        CsError::Message(msg.to_string())
    }
}

impl From<std::io::Error> for CsError {
    fn from(e: std::io::Error) -> Self {
        CsError::Io(e)
    }
}

impl From<CsError> for String {
    fn from(err: CsError) -> Self {
        err.to_string()
    }
}

pub type CsResult<T> = Result<T, CsError>;
