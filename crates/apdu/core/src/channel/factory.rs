use std::fmt;
use std::time::Duration;

use super::{CardChannel, ChannelConfig};
use crate::Result;
use crate::transport::{CancellationToken, TransportError};

/// Source of card channels
///
/// Session code receives a factory at construction instead of looking up
/// readers itself. Discovery blocks until a card is presented, the timeout
/// elapses or the token is cancelled.
pub trait ChannelFactory {
    /// Handle of a discovered card
    type Tag: fmt::Debug;

    /// Channel opened to a discovered card
    type Channel: CardChannel;

    /// Whether the transport exists on this host
    fn is_available(&self) -> bool;

    /// Whether the transport is switched on
    fn is_enabled(&self) -> bool;

    /// Wait for a card
    fn discover(
        &mut self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> std::result::Result<Self::Tag, TransportError>;

    /// Open a channel to a discovered card
    fn connect(&mut self, tag: Self::Tag, config: &ChannelConfig) -> Result<Self::Channel>;

    /// Leave reader mode. Called on every exit path of a session.
    fn stop_discovery(&mut self);
}
