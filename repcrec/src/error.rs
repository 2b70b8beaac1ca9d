use std::fmt::{Display, Formatter};

/// Result type used across the engine.
pub type CResult<T> = std::result::Result<T, Error>;

/// Engine errors. Transaction-level outcomes (blocked, deadlock victim,
/// failure abort) are reported as [`crate::event::Event`]s, not errors;
/// `Error` covers malformed input and driver-side problems only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Input that does not name a valid variable, site or value.
    InvalidInput(String),
    /// A command line that could not be parsed.
    Parse(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
