//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types and traits for exchanging
//! ISO/IEC 7816-4 commands and responses with a smart card.
//!
//! ## Overview
//!
//! - [`Command`] encodes all seven command cases (short and extended length)
//! - [`Response`] decodes the response body and status word
//! - [`StatusTable`] maps status words to command-local outcomes
//! - [`CardTransport`] moves raw bytes, [`CardChannel`] moves commands and responses
//! - [`ChannelFactory`] discovers a card and opens a channel to it
//! - [`CancellationToken`] lets another thread stop a running exchange
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

// Main modules
pub mod channel;
pub mod command;
pub mod response;
pub mod secure_channel;
pub mod transport;

// Core error types
mod error;
pub use error::{Error, Result};

// Re-exports for common types
pub use channel::{
    BasicCardChannel, CancellableChannel, CardChannel, ChannelConfig, ChannelFactory,
};
pub use command::{ApduCommand, Command, CommandCase, ExpectedLength};
pub use response::status::{StatusClass, StatusWord};
pub use response::table::{StatusEntry, StatusTable};
pub use response::Response;
pub use secure_channel::SecureChannelError;
pub use transport::{CancellationToken, CardTransport};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CancellationToken, Command, Error, Response, Result,
        channel::{CardChannel, ChannelConfig, ChannelFactory},
        command::{ApduCommand, CommandError, ExpectedLength},
        response::error::ResponseError,
        response::status::StatusWord,
        response::table::{StatusEntry, StatusTable},
        secure_channel::SecureChannelError,
        transport::{CardTransport, TransportError},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x0C);
        assert_eq!(cmd.cla, 0x00);
        assert_eq!(cmd.ins, 0xA4);
        assert_eq!(cmd.case().unwrap(), CommandCase::Case1);

        let resp = Response::success(Some(Bytes::from_static(&[0x01, 0x02, 0x03])));
        assert!(resp.is_success());
        assert_eq!(resp.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
