//! Card connection over a PC/SC reader

use std::ffi::CString;
use std::fmt;
use std::time::{Duration, Instant};

use egk_apdu_core::transport::TransportError;
use egk_apdu_core::{Bytes, CardTransport};
use pcsc::{Card, Context, Disposition};
use tracing::{debug, warn};

use crate::config::PcscConfig;
use crate::error::PcscError;

/// [`CardTransport`] talking to the card in one PC/SC reader
pub struct PcscTransport {
    context: Context,
    reader: CString,
    card: Option<Card>,
    config: PcscConfig,
    timeout: Option<Duration>,
    receive: Box<[u8]>,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader", &self.reader)
            .field("connected", &self.card.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PcscTransport {
    /// Connect to the card in `reader`
    pub(crate) fn connect(
        context: Context,
        reader: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let reader =
            CString::new(reader).map_err(|_| PcscError::ReaderNotFound(reader.to_owned()))?;
        let mut transport = Self {
            context,
            reader,
            card: None,
            config,
            timeout: None,
            // Extended length responses carry up to 65536 data bytes
            receive: vec![0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED].into_boxed_slice(),
        };
        transport.ensure_card()?;
        Ok(transport)
    }

    /// Name of the reader holding the card
    pub fn reader_name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    fn ensure_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }
        let card = self
            .context
            .connect(&self.reader, self.config.share_mode(), self.config.protocols)
            .map_err(|e| match e {
                pcsc::Error::NoSmartcard => PcscError::NoCard(self.reader_name()),
                e => e.into(),
            })?;
        debug!(reader = ?self.reader, "Card connected");
        self.card = Some(card);
        Ok(())
    }

    fn exchange(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        let Some(card) = self.card.as_mut() else {
            return Err(PcscError::NoCard(self.reader_name()));
        };

        let started = Instant::now();
        let result = card
            .transmit(command, &mut self.receive)
            .map(Bytes::copy_from_slice);
        match result {
            Ok(response) => {
                if self.timeout.is_some_and(|timeout| started.elapsed() > timeout) {
                    warn!(elapsed = ?started.elapsed(), "Card answered after the timeout");
                    return Err(PcscError::Timeout);
                }
                Ok(response)
            }
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                self.card = None;
                // The exchange is not replayed after a reset
                if e == pcsc::Error::ResetCard && self.config.auto_reconnect {
                    warn!(reader = ?self.reader, "Card was reset, reconnecting");
                    self.ensure_card()?;
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        Ok(self.exchange(command)?)
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::ResetCard) {
                debug!(error = %e, "Disconnect for reset failed");
            }
        }
        self.ensure_card()?;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
