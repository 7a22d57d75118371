//! Value types describing the card

mod can;
mod identifiers;
mod key_reference;

pub use can::CardAccessNumber;
pub use identifiers::{
    ApplicationIdentifier, FileDescriptor, FileIdentifier, ShortFileIdentifier,
};
pub use key_reference::KeyReference;

/// Invalid identifier values
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// AID outside 5..=16 bytes
    #[error("Application identifier must be 5 to 16 bytes, got {0}")]
    ApplicationIdentifierLength(usize),

    /// FID that may not name an elementary file
    #[error("File identifier {0:04X} is reserved")]
    ReservedFileIdentifier(u16),

    /// SFID outside 1..=30
    #[error("Short file identifier {0} is outside 1..=30")]
    ShortFileIdentifierRange(u8),

    /// Key or password reference outside its range
    #[error("Key reference {0} is out of range")]
    KeyReferenceRange(u8),

    /// CAN that is not exactly six ASCII digits
    #[error("Card access number must be exactly six digits")]
    InvalidCardAccessNumber,

    /// Identifier given as malformed hex
    #[error("Invalid hex")]
    InvalidHex,
}
