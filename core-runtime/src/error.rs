use thiserror::Error;

/// Errors raised while configuring the core or its ambient services.
#[derive(Error, Debug)]
pub enum Error {
    /// A setting or bridge combination is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host bridge was never injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    pub fn capability_missing(capability: &str, message: impl Into<String>) -> Self {
        Error::CapabilityMissing {
            capability: capability.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
