//! Channel factory backed by PC/SC readers

use std::time::Duration;

use egk_apdu_core::transport::TransportError;
use egk_apdu_core::{BasicCardChannel, CancellationToken, ChannelConfig, ChannelFactory, Result};
use tracing::{debug, info};

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::manager::PcscDeviceManager;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// [`ChannelFactory`] that waits for a card on a PC/SC reader
#[allow(missing_debug_implementations)]
pub struct PcscChannelFactory {
    manager: Option<PcscDeviceManager>,
    config: PcscConfig,
}

impl PcscChannelFactory {
    /// Create a factory with default settings
    ///
    /// A missing PC/SC service is not an error here; the factory then reports
    /// itself as unavailable.
    pub fn new() -> Self {
        Self::with_config(PcscConfig::default())
    }

    /// Create a factory with custom settings
    pub fn with_config(config: PcscConfig) -> Self {
        let manager = match PcscDeviceManager::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                debug!(error = %e, "PC/SC context unavailable");
                None
            }
        };
        Self { manager, config }
    }

    /// Reader configuration
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// List readers known to the PC/SC service
    pub fn list_readers(&self) -> std::result::Result<Vec<PcscReader>, PcscError> {
        self.manager()?.list_readers()
    }

    fn manager(&self) -> std::result::Result<&PcscDeviceManager, PcscError> {
        self.manager
            .as_ref()
            .ok_or(PcscError::Pcsc(pcsc::Error::NoService))
    }
}

impl Default for PcscChannelFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelFactory for PcscChannelFactory {
    type Tag = PcscReader;
    type Channel = BasicCardChannel<PcscTransport>;

    fn is_available(&self) -> bool {
        self.manager.as_ref().is_some_and(PcscDeviceManager::is_valid)
    }

    fn is_enabled(&self) -> bool {
        self.manager
            .as_ref()
            .and_then(|manager| manager.list_readers().ok())
            .is_some_and(|readers| readers.iter().any(|r| self.config.accepts_reader(r.name())))
    }

    fn discover(
        &mut self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> std::result::Result<Self::Tag, TransportError> {
        info!(filter = ?self.config.reader_filter, "Waiting for a card");
        let reader = self.manager()?.wait_for_card(&self.config, timeout, cancel)?;
        Ok(reader)
    }

    fn connect(&mut self, tag: Self::Tag, config: &ChannelConfig) -> Result<Self::Channel> {
        let transport = self
            .manager()
            .and_then(|manager| manager.open_reader_with_config(tag.name(), self.config.clone()))
            .map_err(TransportError::from)?;
        debug!(reader = tag.name(), "Opened card channel");
        BasicCardChannel::with_config(transport, *config)
    }

    fn stop_discovery(&mut self) {
        debug!("Discovery stopped");
    }
}
