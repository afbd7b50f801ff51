use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The credentials were rejected.
    Unauthorized,
    /// The service is temporarily unavailable.
    Unavailable,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if a later attempt of the same request may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimitExceeded | ErrorKind::Unavailable)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "Moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::Unavailable => write!(f, "Service unavailable"),
            ErrorKind::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::RateLimitExceeded.is_transient());
        assert!(ErrorKind::Unavailable.is_transient());
        assert!(!ErrorKind::Unauthorized.is_transient());
        assert!(!ErrorKind::Other.is_transient());
    }
}
