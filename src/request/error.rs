use thiserror::Error;

/// Raised when an inbound request does not have a shape the classifier accepts.
///
/// Always surfaced to the caller, never retried. The HTTP layer turns it into
/// a 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequestError {
    #[error("invalid destination `{servlet}` for request `{url}`")]
    Destination { servlet: String, url: String },
    #[error("not a weblog request, `{url}`")]
    MissingWeblog { url: String },
    #[error("context `{context}` not supported, `{url}`")]
    UnsupportedContext { context: String, url: String },
    #[error("invalid date `{value}`, `{url}`")]
    InvalidDate { value: String, url: String },
    #[error("max number of tags allowed is {max}, `{url}`")]
    TooManyTags { max: usize, url: String },
    #[error("invalid index page `{context}`, `{url}`")]
    BareContext { context: String, url: String },
}
