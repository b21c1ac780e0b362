use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("site file `{path}` is invalid: {message}")]
    Site { path: String, message: String },
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn site(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Site {
            path: path.into(),
            message: message.into(),
        }
    }
}
