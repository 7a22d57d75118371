//! Error types specific to APDU commands

use super::{EXTENDED_WILDCARD, MAX_EXTENDED_DATA};

/// Error for APDU command encoding and decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The command body exceeds the extended length limit
    #[error("Command body too large: {0} bytes (max {max})", max = MAX_EXTENDED_DATA)]
    CommandBodyTooLarge(usize),

    /// The expected response length is outside `[0, 65536]`
    #[error("Expected length out of bounds: {0} (max {max})", max = EXTENDED_WILDCARD)]
    ExpectedLengthOutOfBounds(u32),

    /// Raw command bytes do not form any of the seven command cases
    #[error("Invalid command length: {0}")]
    InvalidLength(usize),

    /// Logical channel numbers are limited to the basic interindustry range
    #[error("Invalid logical channel: {0} (max 3)")]
    InvalidLogicalChannel(u8),

    /// The channel only carries short APDUs
    #[error("Extended length APDUs are not supported by this channel")]
    ExtendedLengthUnsupported,

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(&'static str),
}

impl CommandError {
    /// Create a parse error with a message
    pub const fn parse(message: &'static str) -> Self {
        Self::Parse(message)
    }
}
