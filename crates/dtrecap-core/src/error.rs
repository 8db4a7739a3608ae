use thiserror::Error;

/// Transport-level object store error.
///
/// Every store operation classifies its failure as retryable (transient
/// network/storage trouble) or not, so callers can decide between retrying
/// an upload and degrading to "not cached, re-fetch next time".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object request failed: {message}")]
    Transport { message: String, retryable: bool },

    #[error("object store returned status {status} for '{key}'")]
    Status { status: u16, key: String },

    #[error("malformed listing response: {0}")]
    BadListing(String),
}

impl StoreError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether a retry with backoff is worth attempting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            Self::BadListing(_) => false,
        }
    }
}

/// Errors surfaced by path and date parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path '{0}' does not match the DT file convention")]
    NotADtPath(String),

    #[error("invalid trading date '{0}', expected YYYYMMDD")]
    InvalidDate(String),
}
