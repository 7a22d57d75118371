//! Card reading session
//!
//! [`NfcSession`] drives one read from discovery to the two raw files:
//!
//! `Idle -> Discovering -> Connecting -> EstablishingSecureChannel -> Reading -> Success`
//!
//! Any failure ends in [`SessionState::Error`] with a [`FailureReason`].
//! Cancellation through a [`SessionHandle`] returns the session to
//! [`SessionState::Idle`]. Discovery is stopped and the session keys are
//! zeroed on every exit path.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use egk_apdu_core::transport::TransportError;
use egk_apdu_core::{CancellableChannel, CancellationToken, CardChannel, ChannelFactory};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::pace::{self, PaceError};
use crate::payload::CardData;
use crate::reader::{FileReader, ReadError};
use crate::secure_messaging::SecureMessaging;
use crate::status::ResponseStatus;
use crate::types::CardAccessNumber;

/// Caller visible failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum FailureReason {
    /// The CAN is not six digits
    #[display("invalid CAN")]
    InvalidCan,
    /// The transport does not exist on this host
    #[display("transport unavailable")]
    TransportUnavailable,
    /// The transport is switched off
    #[display("transport disabled")]
    TransportDisabled,
    /// PACE failed because the CAN does not match the card
    #[display("wrong CAN")]
    WrongCan,
    /// The card does not speak the expected protocol
    #[display("unsupported card")]
    UnsupportedCard,
    /// The card left the field or the transport failed
    #[display("connection lost")]
    ConnectionLost,
    /// A file could not be read
    #[display("read error")]
    ReadError,
}

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SessionState {
    /// No read in progress
    #[display("idle")]
    Idle,
    /// Waiting for a card
    #[display("discovering")]
    Discovering,
    /// Opening a channel to the card
    #[display("connecting")]
    Connecting,
    /// Running PACE
    #[display("establishing secure channel")]
    EstablishingSecureChannel,
    /// Reading EF.PD and EF.VD
    #[display("reading")]
    Reading,
    /// Both files were read
    #[display("success")]
    Success,
    /// The read failed
    #[display("error: {_0}")]
    Error(FailureReason),
}

impl SessionState {
    /// Whether the state ends a read
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::Success | Self::Error(_))
    }
}

/// Session failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The CAN is not six digits
    #[error("Invalid card access number")]
    InvalidCan,

    /// The transport does not exist on this host
    #[error("Transport unavailable")]
    TransportUnavailable,

    /// The transport is switched off
    #[error("Transport disabled")]
    TransportDisabled,

    /// The read was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Waiting for a card failed
    #[error("Discovery failed: {0}")]
    Discovery(TransportError),

    /// Opening the channel failed
    #[error("Connecting to the card failed: {0}")]
    Connect(egk_apdu_core::Error),

    /// PACE failed
    #[error(transparent)]
    Pace(#[from] PaceError),

    /// Reading a file failed
    #[error(transparent)]
    Read(#[from] ReadError),
}

fn transport_reason(err: &TransportError) -> Option<FailureReason> {
    match err {
        TransportError::Cancelled => None,
        TransportError::Unavailable => Some(FailureReason::TransportUnavailable),
        TransportError::Disabled => Some(FailureReason::TransportDisabled),
        _ => Some(FailureReason::ConnectionLost),
    }
}

fn channel_reason(err: &egk_apdu_core::Error, otherwise: FailureReason) -> Option<FailureReason> {
    match err {
        egk_apdu_core::Error::Transport(err) => transport_reason(err),
        _ => Some(otherwise),
    }
}

impl SessionError {
    /// Caller visible reason, `None` for a cancelled read
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::InvalidCan => Some(FailureReason::InvalidCan),
            Self::TransportUnavailable => Some(FailureReason::TransportUnavailable),
            Self::TransportDisabled => Some(FailureReason::TransportDisabled),
            Self::Cancelled => None,
            Self::Discovery(err) => transport_reason(err),
            Self::Connect(err) => channel_reason(err, FailureReason::ConnectionLost),
            Self::Pace(err) => match err {
                PaceError::MacPcdVerificationFailedOnCard(_) => Some(FailureReason::WrongCan),
                PaceError::UnexpectedStatus {
                    outcome:
                        ResponseStatus::WrongSecretWarning
                        | ResponseStatus::AuthenticationFailure
                        | ResponseStatus::PasswordBlocked,
                    ..
                } => Some(FailureReason::WrongCan),
                PaceError::Channel(err) => channel_reason(err, FailureReason::UnsupportedCard),
                _ => Some(FailureReason::UnsupportedCard),
            },
            Self::Read(ReadError::Channel(err)) => channel_reason(err, FailureReason::ReadError),
            Self::Read(_) => Some(FailureReason::ReadError),
        }
    }
}

struct Shared {
    state: RwLock<SessionState>,
    subscribers: Mutex<Vec<Sender<SessionState>>>,
    cancel: CancellationToken,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::Idle),
            subscribers: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous == state {
            return;
        }
        debug!(from = %previous, to = %state, "Session state changed");
        // Receivers that were dropped are forgotten
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(state).is_ok());
    }

    fn subscribe(&self) -> Receiver<SessionState> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }
}

/// Clonable handle to observe or cancel a session from another thread
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    /// Current state
    pub fn state(&self) -> SessionState {
        *self.shared.state.read()
    }

    /// Stream of state changes from now on
    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.shared.subscribe()
    }

    /// Stop the running read at its next exchange with the card
    ///
    /// A request made while no read runs cancels the next read.
    pub fn cancel(&self) {
        info!("Session cancellation requested");
        self.shared.cancel.cancel();
    }
}

/// One card reading session over an injected channel factory
pub struct NfcSession<F: ChannelFactory> {
    factory: F,
    config: SessionConfig,
    shared: Arc<Shared>,
}

impl<F: ChannelFactory> fmt::Debug for NfcSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NfcSession")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<F: ChannelFactory> NfcSession<F> {
    /// Session with the default configuration
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, SessionConfig::default())
    }

    /// Session with a custom configuration
    pub fn with_config(factory: F, config: SessionConfig) -> Self {
        Self {
            factory,
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The channel factory
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Handle for other threads
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.shared.state.read()
    }

    /// Stream of state changes from now on
    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.shared.subscribe()
    }

    /// Whether the transport exists on this host
    pub fn is_transport_available(&self) -> bool {
        self.factory.is_available()
    }

    /// Whether the transport is switched on
    pub fn is_transport_enabled(&self) -> bool {
        self.factory.is_enabled()
    }

    /// Cancel the running read
    pub fn cancel(&self) {
        self.handle().cancel();
    }

    /// Read EF.PD and EF.VD from the next card presented
    ///
    /// Blocks until the read completes, fails or is cancelled.
    #[instrument(level = "debug", skip_all)]
    pub fn read_card(&mut self, can: &str) -> Result<CardData, SessionError> {
        if self.state() != SessionState::Idle {
            self.shared.set_state(SessionState::Idle);
        }

        let result = self.run(can);
        // A request that arrives once the read is over must not leak into the next one
        self.shared.cancel.reset();
        match &result {
            Ok(data) => {
                info!(
                    personal_data = data.personal_data.len(),
                    insurance_data = data.insurance_data.len(),
                    "Card read"
                );
                self.shared.set_state(SessionState::Success);
            }
            Err(err) => match err.reason() {
                Some(reason) => {
                    warn!(error = %err, %reason, "Card read failed");
                    self.shared.set_state(SessionState::Error(reason));
                }
                None => {
                    info!("Card read cancelled");
                    self.shared.set_state(SessionState::Idle);
                    return Err(SessionError::Cancelled);
                }
            },
        }
        result
    }

    fn run(&mut self, can: &str) -> Result<CardData, SessionError> {
        let can = CardAccessNumber::new(can).map_err(|_| SessionError::InvalidCan)?;
        if !self.factory.is_available() {
            return Err(SessionError::TransportUnavailable);
        }
        if !self.factory.is_enabled() {
            return Err(SessionError::TransportDisabled);
        }

        let token = self.shared.cancel.clone();
        let result = self.discover_and_read(&can, &token);
        self.factory.stop_discovery();
        result
    }

    fn discover_and_read(
        &mut self,
        can: &CardAccessNumber,
        token: &CancellationToken,
    ) -> Result<CardData, SessionError> {
        token.check().map_err(SessionError::Discovery)?;
        self.shared.set_state(SessionState::Discovering);
        let tag = self
            .factory
            .discover(token, self.config.discovery_timeout)
            .map_err(SessionError::Discovery)?;
        debug!(?tag, "Card discovered");

        self.shared.set_state(SessionState::Connecting);
        let channel = self
            .factory
            .connect(tag, &self.config.channel)
            .map_err(SessionError::Connect)?;
        let mut channel = CancellableChannel::new(channel, token.clone());

        self.shared.set_state(SessionState::EstablishingSecureChannel);
        let keys = pace::establish(&mut channel, can)?;

        let mut secure = SecureMessaging::new(channel, keys);
        self.shared.set_state(SessionState::Reading);
        let result = read_files(&mut secure, self.config.read_secondary);
        secure.invalidate();
        result
    }
}

fn read_files<C: CardChannel>(
    channel: &mut C,
    read_secondary: bool,
) -> Result<CardData, SessionError> {
    let mut reader = FileReader::new(channel);
    let personal_data = reader.read_personal_data()?;
    let insurance_data = reader.read_insurance_data(read_secondary)?;
    Ok(CardData {
        personal_data,
        insurance_data,
    })
}
