//! Error types specific to card transport

/// Transport error type
///
/// Transport errors are always fatal to the current card session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No card is connected
    #[error("Not connected to a card")]
    NotConnected,

    /// The card left the field or was removed from the reader
    #[error("Tag lost")]
    TagLost,

    /// The exchange failed at the driver or radio level
    #[error("Transfer error: {0}")]
    TransferError(String),

    /// The card did not answer within the configured timeout
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The transport is not present on this host
    #[error("Transport unavailable")]
    Unavailable,

    /// The transport is present but switched off
    #[error("Transport disabled")]
    Disabled,

    /// The response did not fit the receive buffer
    #[error("Buffer too small")]
    BufferTooSmall,
}

impl TransportError {
    /// Create a transfer error with a message
    pub fn transfer<S: Into<String>>(message: S) -> Self {
        Self::TransferError(message.into())
    }

    /// Whether the connection to the card is gone
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::TagLost | Self::TransferError(_) | Self::Timeout
        )
    }
}
