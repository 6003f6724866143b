use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The host abandoned the call because a newer request replaced it
    /// (e.g. a second `open` arriving while the first is still loading).
    #[error("Bridge operation interrupted: {0}")]
    Interrupted(String),

    #[error("Resource busy: {0}")]
    Busy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Message fragments hosts use when a load is cut short by a newer one.
    ///
    /// Some engines only surface interruption as free-form text, so the
    /// category is recovered from the message as well as the variant.
    pub const INTERRUPTION_MARKERS: &'static [&'static str] =
        &["interrupted", "superseded", "aborted", "abort"];

    /// Returns `true` if the host reported this failure as an interruption by a
    /// newer request rather than a genuine failure.
    pub fn is_interruption(&self) -> bool {
        match self {
            BridgeError::Interrupted(_) => true,
            BridgeError::OperationFailed(message) => {
                let lower = message.to_lowercase();
                Self::INTERRUPTION_MARKERS
                    .iter()
                    .any(|marker| lower.contains(marker))
            }
            _ => false,
        }
    }

    /// Returns `true` if retrying the same call shortly afterwards may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Busy(_) | BridgeError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
