use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

/// Whether a failed tool call is worth another try by the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments did not fit the tool. The engine reports this back
    /// to the backend as a correction cycle.
    InvalidInput,
    /// The tool ran and failed. The run stops.
    ExecutionError,
}

impl ErrorKind {
    #[inline]
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::ExecutionError => "Execution error",
        }
    }
}

impl Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error a [`Tool`](super::Tool) fails with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// An error about the arguments of the call.
    #[inline]
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// An error raised while the tool was running.
    #[inline]
    pub fn execution_error() -> Self {
        Self::new(ErrorKind::ExecutionError)
    }

    /// Attaches a human-readable reason, shown to the backend.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason, falling back to the kind's description.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        self.reason
            .as_deref()
            .map_or(Cow::Borrowed(self.kind.as_str()), Cow::Borrowed)
    }
}

impl From<serde_json::Error> for Error {
    /// Argument decoding failures are always the caller's fault.
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_input().with_reason(err.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason() {
        let err = Error::execution_error();
        assert_eq!(err.reason(), "Execution error");
        assert_eq!(err.to_string(), "Execution error");

        let err = err.with_reason("page not found");
        assert_eq!(err.reason(), "page not found");
        assert_eq!(err.to_string(), "Execution error: page not found");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = Error::from(json_err);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
