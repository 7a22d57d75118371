//! Configuration options for card channels

use std::time::Duration;

use crate::command::CommandError;

/// Largest response of a short APDU exchange: 256 data bytes and the status word
pub const SHORT_MAX_TRANSCEIVE: usize = 258;
/// Largest response of an extended APDU exchange: 65536 data bytes and the status word
pub const EXTENDED_MAX_TRANSCEIVE: usize = 65_538;
/// Highest logical channel number that fits the basic CLA encoding
pub const MAX_LOGICAL_CHANNEL: u8 = 3;

/// Configuration options for a card channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Logical channel number written into CLA bits 1-0
    pub logical_channel: u8,

    /// Upper bound for a single exchange
    pub timeout: Duration,

    /// Largest response, status word included, the transport can deliver
    pub max_transceive_length: usize,

    /// Whether extended length APDUs may be sent
    pub extended_length: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            logical_channel: 0,
            timeout: Duration::from_secs(5),
            max_transceive_length: EXTENDED_MAX_TRANSCEIVE,
            extended_length: true,
        }
    }
}

impl ChannelConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logical channel number
    pub const fn with_logical_channel(mut self, channel: u8) -> Self {
        self.logical_channel = channel;
        self
    }

    /// Set the per-transmit timeout
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum transceive length
    pub const fn with_max_transceive_length(mut self, length: usize) -> Self {
        self.max_transceive_length = length;
        self
    }

    /// Allow or forbid extended length APDUs
    pub const fn with_extended_length(mut self, extended_length: bool) -> Self {
        self.extended_length = extended_length;
        self
    }

    /// Restrict the channel to short APDUs
    pub const fn short_only(self) -> Self {
        self.with_extended_length(false)
            .with_max_transceive_length(SHORT_MAX_TRANSCEIVE)
    }

    /// Effective maximum transceive length after the extended length switch
    pub const fn effective_max_transceive_length(&self) -> usize {
        if !self.extended_length && self.max_transceive_length > SHORT_MAX_TRANSCEIVE {
            SHORT_MAX_TRANSCEIVE
        } else {
            self.max_transceive_length
        }
    }

    /// Check the configuration
    pub const fn validate(&self) -> Result<(), CommandError> {
        if self.logical_channel > MAX_LOGICAL_CHANNEL {
            return Err(CommandError::InvalidLogicalChannel(self.logical_channel));
        }
        Ok(())
    }
}
