//! Card channels
//!
//! A [`CardChannel`] exchanges one [`Command`] for one [`Response`]. The basic
//! channel sits on a raw [`CardTransport`]; wrappers such as
//! [`CancellableChannel`] or a secure messaging session implement the same
//! trait, so code above the channel never sees what is stacked below it.

mod cancellable;
mod config;
mod factory;

pub use cancellable::CancellableChannel;
pub use config::{
    ChannelConfig, EXTENDED_MAX_TRANSCEIVE, MAX_LOGICAL_CHANNEL, SHORT_MAX_TRANSCEIVE,
};
pub use factory::ChannelFactory;

use std::fmt;

use tracing::{Level, debug, instrument, warn};

use crate::command::{Command, CommandError};
use crate::response::Response;
use crate::transport::CardTransport;
use crate::{Error, Result};

/// Trait for command/response channels to a card
pub trait CardChannel: fmt::Debug {
    /// Transmit one command and return the decoded response
    fn transmit(&mut self, command: &Command) -> Result<Response>;

    /// Largest response, status word included, this channel can deliver
    fn max_transceive_length(&self) -> usize;

    /// Whether extended length APDUs may be sent
    fn supports_extended_length(&self) -> bool {
        self.max_transceive_length() > SHORT_MAX_TRANSCEIVE
    }

    /// Logical channel number written into CLA bits 0-1 on the wire
    ///
    /// Layers that authenticate the header need it to MAC the CLA the card
    /// will actually receive.
    fn logical_channel(&self) -> u8 {
        0
    }
}

/// `cla` with its logical channel bits replaced by `channel`
pub const fn logical_channel_class(cla: u8, channel: u8) -> u8 {
    (cla & !MAX_LOGICAL_CHANNEL) | (channel & MAX_LOGICAL_CHANNEL)
}

impl<C: CardChannel + ?Sized> CardChannel for &mut C {
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        (**self).transmit(command)
    }

    fn max_transceive_length(&self) -> usize {
        (**self).max_transceive_length()
    }

    fn supports_extended_length(&self) -> bool {
        (**self).supports_extended_length()
    }

    fn logical_channel(&self) -> u8 {
        (**self).logical_channel()
    }
}

impl<C: CardChannel + ?Sized> CardChannel for Box<C> {
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        (**self).transmit(command)
    }

    fn max_transceive_length(&self) -> usize {
        (**self).max_transceive_length()
    }

    fn supports_extended_length(&self) -> bool {
        (**self).supports_extended_length()
    }

    fn logical_channel(&self) -> u8 {
        (**self).logical_channel()
    }
}

/// Channel that encodes commands onto a raw transport
#[derive(Debug)]
pub struct BasicCardChannel<T: CardTransport> {
    transport: T,
    config: ChannelConfig,
}

impl<T: CardTransport> BasicCardChannel<T> {
    /// Open the basic channel (logical channel 0) with default settings
    pub fn new(transport: T) -> Self {
        let mut channel = Self {
            transport,
            config: ChannelConfig::default(),
        };
        channel.transport.set_timeout(channel.config.timeout);
        channel
    }

    /// Open a channel with the given configuration
    pub fn with_config(mut transport: T, config: ChannelConfig) -> Result<Self> {
        config.validate()?;
        transport.set_timeout(config.timeout);
        Ok(Self { transport, config })
    }

    /// Channel configuration
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the channel and return the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

}

impl<T: CardTransport> CardChannel for BasicCardChannel<T> {
    #[instrument(level = "trace", skip_all, fields(command = %command))]
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        if !self.transport.is_connected() {
            return Err(crate::transport::TransportError::NotConnected.into());
        }

        if command.is_extended()? && !self.config.extended_length {
            return Err(CommandError::ExtendedLengthUnsupported.into());
        }

        let command = command
            .clone()
            .with_class(logical_channel_class(command.cla, self.config.logical_channel));
        let raw = self.transport.transmit_raw(&command.to_bytes()?)?;
        let response = Response::from_bytes(&raw).map_err(Error::from)?;

        let status = response.status();
        if status.tracing_level() == Level::WARN {
            warn!(
                status = %status,
                description = status.description(),
                "Card returned an error status"
            );
        } else {
            debug!(status = %status, payload_len = response.data().len(), "Command completed");
        }

        Ok(response)
    }

    fn max_transceive_length(&self) -> usize {
        self.config.effective_max_transceive_length()
    }

    fn supports_extended_length(&self) -> bool {
        self.config.extended_length
    }

    fn logical_channel(&self) -> u8 {
        self.config.logical_channel
    }
}
