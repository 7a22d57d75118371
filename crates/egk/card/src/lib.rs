//! German electronic health card (eGK) access over a contactless channel
//!
//! The crate implements the terminal side of reading the insured person's
//! data from an eGK:
//!
//! - [`pace`] agrees session keys from the six digit CAN (PACE with ECDH
//!   generic mapping on brainpoolP256r1 and AES-128)
//! - [`secure_messaging`] protects every later exchange with those keys
//! - [`reader`] reads EF.PD and EF.VD in chunks through any [`CardChannel`]
//! - [`session`] drives discovery, PACE and reading as one state machine
//!   over an injected [`ChannelFactory`]
//!
//! The files are returned raw as [`CardData`]. [`payload`] splits them at
//! their headers and inflates the gzip compressed XML.
//!
//! [`CardChannel`]: egk_apdu_core::CardChannel
//! [`ChannelFactory`]: egk_apdu_core::ChannelFactory
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod commands;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod pace;
pub mod payload;
pub mod reader;
pub mod secure_messaging;
pub mod session;
pub mod status;
pub mod types;

mod error;
pub use error::{Error, Result};

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use pace::{PaceError, PaceKey, PaceState};
pub use payload::{CardData, CardDocuments, PayloadError, RawFilePayload};
pub use reader::{FileReader, ReadError};
pub use secure_messaging::SecureMessaging;
pub use session::{FailureReason, NfcSession, SessionError, SessionHandle, SessionState};
pub use status::ResponseStatus;
pub use types::{CardAccessNumber, IdentifierError};
