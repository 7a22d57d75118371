//! PC/SC transport for APDU operations
//!
//! This crate connects the channel abstractions of `egk-apdu-core` to
//! contactless readers driven by the PC/SC service (pcsc-lite, WinSCard).
//!
//! [`PcscChannelFactory`] is the entry point for session code: it waits for a
//! card on an accepted reader and opens a [`BasicCardChannel`] to it.
//!
//! [`BasicCardChannel`]: egk_apdu_core::BasicCardChannel
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod config;
mod error;
mod factory;
mod manager;
mod reader;
mod transport;

pub use config::PcscConfig;
pub use error::PcscError;
pub use factory::PcscChannelFactory;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Protocol flags used in `PcscConfig`
pub use pcsc::Protocols;
