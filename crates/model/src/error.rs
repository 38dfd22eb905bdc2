use std::fmt::{self, Display, Formatter};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The provider could not be reached, or it failed on its side.
    Unavailable,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if sending the same request again may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimitExceeded | ErrorKind::Unavailable)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}
