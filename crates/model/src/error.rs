use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The model provider is rate limited. Requests failing with this kind
    /// are safe to retry.
    RateLimitExceeded,
    /// The credential was rejected by the provider.
    Unauthorized,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if a request failing with this kind may succeed when
    /// sent again unchanged.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimitExceeded)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::Other => write!(f, "model error"),
        }
    }
}
