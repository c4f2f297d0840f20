use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required key is absent from the role configuration.
    ConfigKeyMissing,
    /// Two roles share a name (or an identifier).
    DuplicateRoleName,
    /// A tool name does not resolve in the registry.
    UnknownTool,
    /// The backend asked for a tool the active role may not use.
    ToolNotPermitted,
    /// A domain tool failed while running.
    ToolExecutionError,
    /// The backend kept making invalid tool calls.
    MaxCorrectionCyclesExceeded,
    /// An API key is not set.
    MissingCredential,
    /// The completion backend failed or could not be reached.
    BackendUnavailable,
    /// Tool arguments do not match the declared schema.
    InvalidToolArguments,
    /// The configuration could not be read or is inconsistent.
    InvalidConfig,
    /// Input was submitted to a run that already finished or failed.
    RunFinished,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::ConfigKeyMissing => "Config key missing",
            ErrorKind::DuplicateRoleName => "Duplicate role name",
            ErrorKind::UnknownTool => "Unknown tool",
            ErrorKind::ToolNotPermitted => "Tool not permitted",
            ErrorKind::ToolExecutionError => "Tool execution error",
            ErrorKind::MaxCorrectionCyclesExceeded => {
                "Max correction cycles exceeded"
            }
            ErrorKind::MissingCredential => "Missing credential",
            ErrorKind::BackendUnavailable => "Backend unavailable",
            ErrorKind::InvalidToolArguments => "Invalid tool arguments",
            ErrorKind::InvalidConfig => "Invalid config",
            ErrorKind::RunFinished => "Run finished",
        };
        f.write_str(text)
    }
}

/// The error type of the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates an error of the given kind without a reason.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error, or the kind's description.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(self.kind.to_string()),
        }
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.kind, reason),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}
