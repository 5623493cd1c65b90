use thiserror::Error;

use crate::http::TransportError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the underlying operation was aborted by the
    /// caller rather than failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Transport(t) if t.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
