//! PC/SC reader settings

use std::time::Duration;

use pcsc::{Protocols, ShareMode};

/// How readers are selected and cards are connected
#[derive(Debug, Clone)]
pub struct PcscConfig {
    /// Keep other applications off the card during a session
    pub exclusive: bool,

    /// Protocols offered when connecting, T=1 for contactless cards
    pub protocols: Protocols,

    /// Reconnect when the card was reset, so the reader stays usable
    pub auto_reconnect: bool,

    /// Upper bound of one reader status query while waiting for a card
    pub poll_interval: Duration,

    /// Only readers whose name contains this string are used
    pub reader_filter: Option<String>,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            exclusive: true,
            protocols: Protocols::ANY,
            auto_reconnect: true,
            poll_interval: Duration::from_millis(250),
            reader_filter: None,
        }
    }
}

impl PcscConfig {
    /// Default settings: exclusive access, any protocol, reconnect on reset
    pub fn new() -> Self {
        Self::default()
    }

    /// Share the card with other applications
    pub const fn shared(mut self) -> Self {
        self.exclusive = false;
        self
    }

    /// Restrict the protocols offered on connect
    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Enable or disable reconnecting after a card reset
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Set the reader status polling interval
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Only use readers whose name contains `name`
    pub fn with_reader_filter(mut self, name: impl Into<String>) -> Self {
        self.reader_filter = Some(name.into());
        self
    }

    /// Whether a reader passes the name filter
    pub fn accepts_reader(&self, name: &str) -> bool {
        self.reader_filter
            .as_deref()
            .is_none_or(|filter| name.contains(filter))
    }

    pub(crate) const fn share_mode(&self) -> ShareMode {
        if self.exclusive {
            ShareMode::Exclusive
        } else {
            ShareMode::Shared
        }
    }
}
