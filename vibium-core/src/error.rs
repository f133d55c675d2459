use std::fmt;
use std::time::Duration;

/// The broker's error taxonomy (spec §7).
///
/// Every variant maps to one of: Validation, Timeout, Not-found,
/// Actionability, BiDi, Session-closed, Transport. Extension handlers never
/// retry past their declared timeout and never attempt recovery beyond
/// retry-until-timeout; they surface one of these to the caller.
#[derive(Debug)]
pub enum VibiumError {
    /// Missing or invalid parameter, reported before any browser call.
    Validation(String),

    /// A poll loop (resolve, wait-for-*) ran out its deadline.
    Timeout {
        check: Option<String>,
        reason: Option<String>,
        elapsed: Duration,
    },

    /// Resolve returned `not_found` at the deadline.
    NotFound { locator: String },

    /// Resolve returned `failed` for one of the actionability checks.
    Actionability {
        locator: String,
        check: String,
        reason: String,
    },

    /// The browser reported a `{"type": "error"}` frame.
    Bidi {
        method: String,
        error: String,
        message: String,
    },

    /// The session was closed; no further internal commands can be issued.
    SessionClosed,

    /// The client or BiDi transport failed at the I/O level.
    Transport(String),

    Json(serde_json::Error),

    Io(std::io::Error),
}

impl fmt::Display for VibiumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VibiumError::Validation(msg) => write!(f, "validation error: {msg}"),
            VibiumError::Timeout {
                check,
                reason,
                elapsed,
            } => {
                write!(f, "timeout after {elapsed:?}")?;
                if let Some(check) = check {
                    write!(f, ": {check} check failed")?;
                }
                if let Some(reason) = reason {
                    write!(f, " — {reason}")?;
                }
                Ok(())
            }
            VibiumError::NotFound { locator } => write!(f, "element not found: {locator}"),
            VibiumError::Actionability {
                locator,
                check,
                reason,
            } => write!(f, "{check} check failed for {locator} — {reason}"),
            VibiumError::Bidi {
                method,
                error,
                message,
            } => write!(f, "{method}: {error}: {message}"),
            VibiumError::SessionClosed => write!(f, "session closed"),
            VibiumError::Transport(msg) => write!(f, "transport error: {msg}"),
            VibiumError::Json(err) => write!(f, "{err}"),
            VibiumError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for VibiumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VibiumError::Json(err) => Some(err),
            VibiumError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VibiumError {
    fn from(err: serde_json::Error) -> Self {
        VibiumError::Json(err)
    }
}

impl From<std::io::Error> for VibiumError {
    fn from(err: std::io::Error) -> Self {
        VibiumError::Io(err)
    }
}

impl From<vibium_types::FrameError> for VibiumError {
    fn from(err: vibium_types::FrameError) -> Self {
        VibiumError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VibiumError>;

impl VibiumError {
    pub fn validation(msg: impl Into<String>) -> Self {
        VibiumError::Validation(msg.into())
    }

    pub fn timeout(elapsed: Duration, check: Option<String>, reason: Option<String>) -> Self {
        VibiumError::Timeout {
            check,
            reason,
            elapsed,
        }
    }

    pub fn not_found(locator: impl Into<String>) -> Self {
        VibiumError::NotFound {
            locator: locator.into(),
        }
    }

    pub fn actionability(
        locator: impl Into<String>,
        check: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        VibiumError::Actionability {
            locator: locator.into(),
            check: check.into(),
            reason: reason.into(),
        }
    }

    pub fn bidi(method: impl Into<String>, error: impl Into<String>, message: impl Into<String>) -> Self {
        VibiumError::Bidi {
            method: method.into(),
            error: error.into(),
            message: message.into(),
        }
    }

    /// A stable, serializable kind string for the BiDi error response shape.
    pub fn kind(&self) -> &'static str {
        match self {
            VibiumError::Validation(_) => "validation error",
            VibiumError::Timeout { .. } => "timeout",
            VibiumError::NotFound { .. } => "no such element",
            VibiumError::Actionability { .. } => "actionability error",
            VibiumError::Bidi { .. } => "unknown error",
            VibiumError::SessionClosed => "session closed",
            VibiumError::Transport(_) => "transport error",
            VibiumError::Json(_) => "unknown error",
            VibiumError::Io(_) => "unknown error",
        }
    }
}
