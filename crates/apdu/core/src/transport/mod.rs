//! Transport traits for APDU communication with cards
//!
//! A transport moves raw bytes to the card and back. It has no knowledge of
//! command structure, logical channels or secure messaging.

mod cancel;
pub mod error;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
pub use cancel::CancellationToken;
pub use error::TransportError;
use tracing::{debug, trace};

/// Byte pipe to a card, such as a PC/SC reader or an NFC tag
pub trait CardTransport: Send + fmt::Debug {
    /// Exchange one encoded command for the raw response, with hex tracing
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "C-APDU");
        self.do_transmit_raw(command)
            .inspect(|response| trace!(response = %hex::encode(response), "R-APDU"))
            .inspect_err(|e| debug!(error = %e, "Exchange failed"))
    }

    /// Transport specific exchange behind [`Self::transmit_raw`]
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Whether a card is currently reachable
    fn is_connected(&self) -> bool;

    /// Reset the card and reconnect
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Bound the time a single exchange may take
    ///
    /// Transports without a native timeout ignore this.
    fn set_timeout(&mut self, timeout: Duration) {
        let _ = timeout;
    }
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout);
    }
}

/// Transport replaying canned responses, recording what was sent
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    pub(crate) replies: std::collections::VecDeque<Bytes>,
    pub(crate) sent: Vec<Bytes>,
    pub(crate) absent: bool,
    pub(crate) timeout: Option<Duration>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub(crate) fn new(replies: &[&'static [u8]]) -> Self {
        let replies = replies.iter().copied().map(Bytes::from_static).collect();
        Self { replies, ..Self::default() }
    }

    /// Answers one command with `90 00`
    pub(crate) fn ok() -> Self {
        Self::new(&[&[0x90, 0x00]])
    }
}

#[cfg(test)]
impl CardTransport for ScriptedTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if self.absent {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(Bytes::copy_from_slice(command));
        self.replies.pop_front().ok_or(TransportError::TagLost)
    }

    fn is_connected(&self) -> bool {
        !self.absent
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.absent = false;
        self.sent.clear();
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}
