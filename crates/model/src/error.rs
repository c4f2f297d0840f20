use std::fmt::{self, Display};

/// The kind of error a completion backend reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The backend could not be reached or answered with a failure status.
    Unavailable,
    /// The backend answered with something that could not be decoded.
    InvalidResponse,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::Moderated => "content moderated",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Unavailable => "backend unavailable",
            ErrorKind::InvalidResponse => "invalid response",
            ErrorKind::Other => "other error",
        };
        f.write_str(text)
    }
}
