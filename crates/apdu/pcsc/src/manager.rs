//! PC/SC context owner: reader enumeration and card detection

use std::ffi::CString;
use std::time::{Duration, Instant};

use egk_apdu_core::CancellationToken;
use pcsc::{Context, ReaderState, Scope, State};
use tracing::{debug, trace};

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// Owns the PC/SC context shared by every connection it opens
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    context: Context,
}

impl PcscDeviceManager {
    /// Establish a user scoped PC/SC context
    pub fn new() -> Result<Self, PcscError> {
        Ok(Self { context: Context::establish(Scope::User)? })
    }

    /// Whether the PC/SC service still answers on this context
    pub fn is_valid(&self) -> bool {
        self.context.is_valid().is_ok()
    }

    /// Readers attached right now, with their card state
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let mut states = self.reader_states()?;
        if states.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        if let Err(e) = self.context.get_status_change(Duration::ZERO, &mut states) {
            // Without status information every reader is reported empty
            debug!(error = %e, "Could not query reader status");
            return Ok(states.iter().map(|rs| PcscReader::empty(reader_name(rs))).collect());
        }
        Ok(states.iter().map(PcscReader::from_state).collect())
    }

    /// Connect to the card in `reader`
    pub fn open_reader_with_config(
        &self,
        reader: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        PcscTransport::connect(self.context.clone(), reader, config)
    }

    /// Block until an accepted reader holds a card
    ///
    /// Reader events are awaited in slices of `config.poll_interval` so the
    /// token and the deadline are checked even when nothing happens.
    pub fn wait_for_card(
        &self,
        config: &PcscConfig,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<PcscReader, PcscError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut states = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(PcscError::Cancelled);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(PcscError::Timeout);
            }

            // Rebuild the watch list when readers come and go
            if states.is_empty() {
                states = self.reader_states()?;
                states.push(ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE));
            }

            match self.context.get_status_change(config.poll_interval, &mut states) {
                Ok(()) => {}
                Err(pcsc::Error::Timeout) => continue,
                Err(e) => return Err(e.into()),
            }

            let mut attached_changed = false;
            for rs in &mut states {
                if rs.name() == pcsc::PNP_NOTIFICATION() {
                    attached_changed |= rs.event_state().contains(State::CHANGED);
                    rs.sync_current_state();
                    continue;
                }
                let reader = PcscReader::from_state(rs);
                trace!(reader = %reader, state = ?rs.event_state(), "Reader state");
                if reader.has_card() && config.accepts_reader(reader.name()) {
                    debug!(reader = reader.name(), "Card detected");
                    return Ok(reader);
                }
                rs.sync_current_state();
            }

            if attached_changed {
                debug!("Reader list changed");
                states.clear();
            }
        }
    }

    fn reader_states(&self) -> Result<Vec<ReaderState>, PcscError> {
        let names: Vec<CString> = match self.context.list_readers_owned() {
            Ok(names) => names,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(names.into_iter().map(|name| ReaderState::new(name, State::UNAWARE)).collect())
    }
}

fn reader_name(state: &ReaderState) -> String {
    state.name().to_string_lossy().into_owned()
}
