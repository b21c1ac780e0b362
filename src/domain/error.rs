use thiserror::Error;

/// Failure while resolving a weblog entity by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("weblog `{handle}` not found")]
    UnknownWeblog { handle: String },
    #[error("lookup backend failure: {message}")]
    Backend { message: String },
}

impl LookupError {
    pub fn unknown_weblog(handle: impl Into<String>) -> Self {
        Self::UnknownWeblog {
            handle: handle.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
