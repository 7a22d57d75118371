//! Error types for PC/SC transport

use egk_apdu_core::transport::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),

    /// Waiting for a card was cancelled
    #[error("Waiting for a card was cancelled")]
    Cancelled,

    /// No card was presented before the timeout
    #[error("No card presented before the timeout")]
    Timeout,
}

impl From<PcscError> for TransportError {
    fn from(err: PcscError) -> Self {
        match err {
            PcscError::Pcsc(pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard) => Self::TagLost,
            PcscError::Pcsc(pcsc::Error::Timeout) | PcscError::Timeout => Self::Timeout,
            PcscError::Pcsc(pcsc::Error::NoService | pcsc::Error::ServiceStopped) => {
                Self::Unavailable
            }
            PcscError::Pcsc(pcsc::Error::InsufficientBuffer) => Self::BufferTooSmall,
            PcscError::NoReadersAvailable | PcscError::Pcsc(pcsc::Error::NoReadersAvailable) => {
                Self::Disabled
            }
            PcscError::NoCard(_) => Self::NotConnected,
            PcscError::Cancelled => Self::Cancelled,
            other => Self::transfer(other.to_string()),
        }
    }
}
