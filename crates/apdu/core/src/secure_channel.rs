//! Failure kinds of secure messaging channels
//!
//! The cryptography lives with the card application; this crate only knows
//! how a secured channel can fail, so that callers above the channel boundary
//! can match those failures without knowing the channel is secured.

/// Errors raised while protecting or unprotecting an exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecureChannelError {
    /// The command already has the secure messaging bits set in CLA
    #[error("APDU is already encrypted")]
    ApduAlreadyEncrypted,

    /// The response MAC does not match the locally computed one
    #[error("MAC verification failed")]
    MacVerificationFailed,

    /// A mandatory data object is absent from the protected response
    #[error("Missing secure messaging data object {0:#04X}")]
    MissingDataObject(u8),

    /// A data object has the wrong length or an unexpected tag
    #[error("Malformed secure messaging data object: {0}")]
    MalformedDataObject(&'static str),

    /// Decrypted data does not end with ISO/IEC 7816-4 padding
    #[error("Invalid padding in decrypted data")]
    InvalidPadding,

    /// The encrypted data object announced an unknown padding scheme
    #[error("Unsupported padding indicator {0:#04X}")]
    UnsupportedPaddingIndicator(u8),

    /// The session keys were zeroed and the channel must not be reused
    #[error("Secure messaging session invalidated")]
    SessionInvalidated,
}

impl SecureChannelError {
    /// Whether the session must be considered compromised
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::ApduAlreadyEncrypted)
    }
}
