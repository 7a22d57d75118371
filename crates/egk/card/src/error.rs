use crate::crypto::ec::EcError;
use crate::crypto::symmetric::CipherError;
use crate::pace::PaceError;
use crate::payload::PayloadError;
use crate::reader::ReadError;
use crate::session::SessionError;
use crate::types::IdentifierError;

/// Result type for health card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for health card operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Channel, transport or secure messaging failure
    #[error(transparent)]
    Channel(#[from] egk_apdu_core::Error),

    /// Invalid identifier or CAN
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Elliptic curve failure
    #[error(transparent)]
    Ec(#[from] EcError),

    /// Block cipher failure
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// PACE failure
    #[error(transparent)]
    Pace(#[from] PaceError),

    /// File access failure
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Payload layout or decompression failure
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Session failure
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FailureReason;

    #[test]
    fn test_conversions_keep_the_source() {
        let err: Error = SessionError::InvalidCan.into();
        assert!(matches!(
            &err,
            Error::Session(inner) if inner.reason() == Some(FailureReason::InvalidCan)
        ));
        assert_eq!(err.to_string(), "Invalid card access number");

        let err: Error = PayloadError::InvalidOffsets { start: 4, end: 2 }.into();
        assert_eq!(err.to_string(), "Invalid offsets 0x0004..=0x0002");
    }
}
