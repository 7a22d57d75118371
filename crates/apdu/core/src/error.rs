//! Core error type for all APDU operations
//!
//! Every layer of this crate has its own closed error enum. [`Error`] wraps
//! them so that channels can report any of them through a single type.

use crate::command::CommandError;
use crate::response::error::ResponseError;
use crate::secure_channel::SecureChannelError;
use crate::transport::TransportError;

/// Result type for APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The command could not be encoded or decoded
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The response could not be decoded
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The transport failed to deliver the exchange
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Protecting or unprotecting an exchange failed
    #[error(transparent)]
    SecureChannel(#[from] SecureChannelError),
}

impl Error {
    /// Whether this error originates from the physical transport
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this error was caused by a cancellation request
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }

    /// Whether the secure messaging layer rejected the exchange
    pub const fn is_secure_channel(&self) -> bool {
        matches!(self, Self::SecureChannel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err: Error = TransportError::Cancelled.into();
        assert!(err.is_transport());
        assert!(err.is_cancelled());

        let err: Error = TransportError::TagLost.into();
        assert!(err.is_transport());
        assert!(!err.is_cancelled());

        let err: Error = SecureChannelError::MacVerificationFailed.into();
        assert!(err.is_secure_channel());
        assert!(!err.is_transport());

        let err: Error = CommandError::CommandBodyTooLarge(70_000).into();
        assert_eq!(err.to_string(), "Command body too large: 70000 bytes (max 65535)");
    }
}
