//! Session configuration

use std::time::Duration;

use egk_apdu_core::ChannelConfig;

/// Configuration of a card reading session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for a card, `None` waits until cancelled
    pub discovery_timeout: Option<Duration>,

    /// Settings of the channel opened to the card
    pub channel: ChannelConfig,

    /// Whether EF.VD is read up to the end of the protected insurance data
    pub read_secondary: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: None,
            channel: ChannelConfig::default(),
            read_secondary: true,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up discovery after `timeout`
    pub const fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = Some(timeout);
        self
    }

    /// Set the channel configuration
    pub const fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Read or skip the protected insurance data
    pub const fn with_read_secondary(mut self, read_secondary: bool) -> Self {
        self.read_secondary = read_secondary;
        self
    }
}
