//! Error kinds raised while acquiring a results document.
//!
//! Only acquisition can fail. Parsers are total over their input shape and
//! lookups report absence with `Option`, so there is no "not found" error.

use thiserror::Error;

/// Failure to obtain a usable results document from the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network or filesystem failure, non-2xx response, timeout, or empty body.
    ///
    /// `status` is the upstream HTTP status, or `0` when no response was
    /// received (DNS failure, refused connection, timeout, unreadable file).
    #[error("fetch error (status {status}): {message}")]
    Fetch { status: u16, message: String },

    /// The document was received but could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },
}

impl SourceError {
    pub fn fetch(status: u16, message: impl Into<String>) -> Self {
        SourceError::Fetch {
            status,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        SourceError::Parse {
            message: message.into(),
        }
    }

    /// Upstream status carried by a fetch error; `None` for parse errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Fetch { status, .. } => Some(*status),
            SourceError::Parse { .. } => None,
        }
    }
}
