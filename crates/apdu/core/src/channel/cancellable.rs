use tracing::debug;

use super::CardChannel;
use crate::Result;
use crate::command::Command;
use crate::response::Response;
use crate::transport::CancellationToken;

/// Channel wrapper that checks a [`CancellationToken`] before every transmit
#[derive(Debug)]
pub struct CancellableChannel<C> {
    inner: C,
    token: CancellationToken,
}

impl<C: CardChannel> CancellableChannel<C> {
    /// Wrap a channel
    pub const fn new(inner: C, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    /// The token observed by this channel
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Get a reference to the wrapped channel
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Get a mutable reference to the wrapped channel
    pub const fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Unwrap the channel
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: CardChannel> CardChannel for CancellableChannel<C> {
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        if let Err(err) = self.token.check() {
            debug!(command = %command, "Cancellation requested, not transmitting");
            return Err(err.into());
        }
        self.inner.transmit(command)
    }

    fn max_transceive_length(&self) -> usize {
        self.inner.max_transceive_length()
    }

    fn supports_extended_length(&self) -> bool {
        self.inner.supports_extended_length()
    }

    fn logical_channel(&self) -> u8 {
        self.inner.logical_channel()
    }
}
