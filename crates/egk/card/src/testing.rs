//! Simulated health card and channel factory for tests
//!
//! The card plays its side of PACE and secure messaging with the same crypto
//! primitives and serves files by SFID and offset.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use egk_apdu_core::channel::logical_channel_class;
use egk_apdu_core::command::{CommandError, EXTENDED_WILDCARD, ExpectedLength, SHORT_WILDCARD};
use egk_apdu_core::transport::TransportError;
use egk_apdu_core::{
    CancellationToken, CardChannel, ChannelConfig, ChannelFactory, Command, Response, StatusWord,
};
use parking_lot::Mutex;
use rand::{RngCore, rng};
use zeroize::Zeroizing;

use crate::commands::dynamic_authentication_data;
use crate::constants::{EF_PD, EF_VD, tags};
use crate::crypto::ec::{self, EcPoint, KeyPair};
use crate::crypto::kdf::{KeyPurpose, derive_key};
use crate::crypto::symmetric;
use crate::pace::{self, PaceKey, authentication_token};
use crate::secure_messaging::{
    CLA_SECURE_MESSAGING, SecureMessaging, SendSequenceCounter, decrypt_data, encrypt_data,
    parse_data_objects, push_data_object,
};
use crate::types::{ApplicationIdentifier, CardAccessNumber, FileDescriptor};

const SW_SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
const SW_END_OF_FILE: StatusWord = StatusWord::new(0x62, 0x82);
const SW_AUTHENTICATION_FAILED: StatusWord = StatusWord::new(0x63, 0x00);
const SW_NO_CURRENT_EF: StatusWord = StatusWord::new(0x69, 0x86);
const SW_SM_OBJECTS_MISSING: StatusWord = StatusWord::new(0x69, 0x87);
const SW_SM_OBJECTS_INCORRECT: StatusWord = StatusWord::new(0x69, 0x88);
const SW_WRONG_DATA: StatusWord = StatusWord::new(0x6A, 0x80);
const SW_FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);
const SW_WRONG_OFFSET: StatusWord = StatusWord::new(0x6B, 0x00);
const SW_INS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6D, 0x00);

/// EF.PD of `len` bytes: little endian length prefix, then filler
pub(crate) fn personal_data_file(len: usize) -> Bytes {
    let mut file = ((len - 2) as u16).to_le_bytes().to_vec();
    file.extend((0..len - 2).map(|i| (i % 251) as u8));
    file.into()
}

/// EF.VD of `len` bytes: VD in the first two thirds, GVD in the rest
pub(crate) fn insurance_data_file(len: usize) -> Bytes {
    let end_vd = (len * 2 / 3 - 1) as u16;
    let mut file = Vec::with_capacity(len);
    for offset in [8, end_vd, end_vd + 1, (len - 1) as u16] {
        file.extend_from_slice(&u16::to_be_bytes(offset));
    }
    file.extend((8..len).map(|i| (i % 13) as u8));
    file.into()
}

/// Run PACE against `card` with its own CAN and wrap it in secure messaging
///
/// Also returns the number of commands the card has seen.
pub(crate) fn established(mut card: SimulatedCard) -> (SecureMessaging<SimulatedCard>, usize) {
    let can = CardAccessNumber::new(&card.can).unwrap();
    let keys = pace::establish(&mut card, &can).unwrap();
    let sent = card.transmitted;
    (SecureMessaging::new(card, keys), sent)
}

#[derive(Debug, Clone, Default)]
struct PaceSession {
    nonce: Option<Vec<u8>>,
    mapping: Option<Arc<KeyPair>>,
    ephemeral: Option<Arc<KeyPair>>,
    terminal_ephemeral: Option<EcPoint>,
}

/// Card side of PACE, secure messaging and file access
#[derive(Debug, Clone)]
pub(crate) struct SimulatedCard {
    can: String,
    config: ChannelConfig,
    files: Vec<(FileDescriptor, Bytes)>,
    selected_application: Option<ApplicationIdentifier>,
    current_file: Option<usize>,
    pace: PaceSession,
    shared_secret: Option<Zeroizing<[u8; 32]>>,
    ssc: SendSequenceCounter,
    transmitted: usize,
    commands: Arc<Mutex<Vec<Command>>>,

    max_response_data: Option<usize>,
    forged_token: bool,
    tampered_responses: bool,
    mse_status: Option<StatusWord>,
    tag_lost_after: Option<usize>,
    cancel_on_read: Option<CancellationToken>,
}

impl SimulatedCard {
    /// Card with the given CAN, EF.PD of 300 bytes and EF.VD of 150 bytes
    pub(crate) fn new(can: &str) -> Self {
        Self {
            can: can.to_owned(),
            config: ChannelConfig::default(),
            files: vec![
                (EF_PD, personal_data_file(300)),
                (EF_VD, insurance_data_file(150)),
            ],
            selected_application: None,
            current_file: None,
            pace: PaceSession::default(),
            shared_secret: None,
            ssc: SendSequenceCounter::new(),
            transmitted: 0,
            commands: Arc::default(),
            max_response_data: None,
            forged_token: false,
            tampered_responses: false,
            mse_status: None,
            tag_lost_after: None,
            cancel_on_read: None,
        }
    }

    /// Replace or add a file
    pub(crate) fn with_file(mut self, file: FileDescriptor, contents: impl Into<Bytes>) -> Self {
        self.files.retain(|(existing, _)| existing != &file);
        self.files.push((file, contents.into()));
        self
    }

    /// Limits reported to the terminal
    pub(crate) const fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Return at most `len` bytes per READ BINARY
    pub(crate) const fn with_max_response_data(mut self, len: usize) -> Self {
        self.max_response_data = Some(len);
        self
    }

    /// Send a wrong card token in the last PACE step
    pub(crate) const fn with_forged_token(mut self) -> Self {
        self.forged_token = true;
        self
    }

    /// Corrupt the MAC of every protected response
    pub(crate) const fn with_tampered_responses(mut self) -> Self {
        self.tampered_responses = true;
        self
    }

    /// Answer MSE:SET AT with a fixed status
    pub(crate) const fn with_mse_status(mut self, sw1: u8, sw2: u8) -> Self {
        self.mse_status = Some(StatusWord::new(sw1, sw2));
        self
    }

    /// Fail every exchange after `count` commands
    pub(crate) const fn with_tag_lost_after(mut self, count: usize) -> Self {
        self.tag_lost_after = Some(count);
        self
    }

    /// Keys agreed in the last successful PACE run, derived afresh on each call
    pub(crate) fn session_key(&self) -> Option<PaceKey> {
        self.shared_secret.as_ref().map(|secret| PaceKey::derive(secret.as_slice()))
    }

    /// Plain commands received so far, shared between clones
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    fn reset_security(&mut self) {
        self.pace = PaceSession::default();
        self.shared_secret = None;
        self.ssc = SendSequenceCounter::new();
    }

    fn unprotect_command(&mut self, command: &Command) -> Result<Command, StatusWord> {
        let Some(key) = self.session_key() else {
            return Err(SW_SM_OBJECTS_MISSING);
        };
        self.ssc.increment();

        let objects = parse_data_objects(command.body()).map_err(|_| SW_SM_OBJECTS_INCORRECT)?;
        let mac_index = objects
            .iter()
            .position(|object| object.tag == tags::SM_MAC)
            .ok_or(SW_SM_OBJECTS_MISSING)?;

        let mut mac_input = symmetric::padded(&[command.cla, command.ins, command.p1, command.p2]);
        for object in &objects[..mac_index] {
            mac_input.extend_from_slice(object.raw);
        }
        if !symmetric::mac_matches(&self.ssc.mac(&key, &mac_input), objects[mac_index].value) {
            return Err(SW_SM_OBJECTS_INCORRECT);
        }

        let mut plain = Command::new(
            command.cla & !CLA_SECURE_MESSAGING,
            command.ins,
            command.p1,
            command.p2,
        );
        for object in &objects[..mac_index] {
            match (object.tag, object.value) {
                (tags::SM_ENCRYPTED_DATA, value) => {
                    let data = decrypt_data(&key, &self.ssc, value)
                        .map_err(|_| SW_SM_OBJECTS_INCORRECT)?;
                    plain = plain.with_data(data);
                }
                (tags::SM_EXPECTED_LENGTH, [0x00]) => plain = plain.with_le(SHORT_WILDCARD),
                (tags::SM_EXPECTED_LENGTH, [0x00, 0x00]) => {
                    plain = plain.with_le(EXTENDED_WILDCARD);
                }
                (tags::SM_EXPECTED_LENGTH, [le]) => {
                    plain = plain.with_le(ExpectedLength::from(*le));
                }
                (tags::SM_EXPECTED_LENGTH, [hi, lo]) => {
                    plain = plain.with_le(ExpectedLength::from(u16::from_be_bytes([*hi, *lo])));
                }
                _ => return Err(SW_SM_OBJECTS_INCORRECT),
            }
        }
        Ok(plain)
    }

    fn protect_response(&mut self, response: Response) -> Response {
        let Some(key) = self.session_key() else {
            return response;
        };
        if response.data().is_empty() && !response.is_success() {
            return response;
        }
        self.ssc.increment();

        let mut body = Vec::new();
        if !response.data().is_empty() {
            let value = encrypt_data(&key, &self.ssc, response.data()).unwrap();
            push_data_object(&mut body, tags::SM_ENCRYPTED_DATA, &value);
        }
        push_data_object(&mut body, tags::SM_STATUS, &response.status().to_bytes());
        let mut mac = self.ssc.mac(&key, &body);
        if self.tampered_responses {
            mac[0] ^= 0xFF;
        }
        push_data_object(&mut body, tags::SM_MAC, &mac);
        Response::new(Some(body.into()), response.status())
    }

    fn process(&mut self, command: &Command) -> Response {
        self.commands.lock().push(command.clone());
        match command.ins {
            0x22 => self.manage_security_environment(),
            0x86 => self.general_authenticate(command),
            0xA4 => self.select(command),
            0xB0 => self.read_binary(command),
            // Echo, used to exercise secure messaging
            0xEE => Response::new(Some(Bytes::copy_from_slice(command.body())), SW_SUCCESS),
            _ => Response::error(SW_INS_NOT_SUPPORTED),
        }
    }

    fn manage_security_environment(&mut self) -> Response {
        if let Some(status) = self.mse_status {
            return Response::error(status);
        }
        self.reset_security();
        Response::success(None)
    }

    fn general_authenticate(&mut self, command: &Command) -> Response {
        let object = |tag| dynamic_authentication_data(command.body(), tag).ok();
        let reply = |tag, value: &[u8]| {
            let mut inner = Vec::new();
            push_data_object(&mut inner, tag, value);
            let mut data = Vec::new();
            push_data_object(&mut data, tags::DYNAMIC_AUTHENTICATION_DATA, &inner);
            Response::success(Some(data.into()))
        };
        let generator = EcPoint::generator();

        if let Some(terminal_mapping) = object(tags::MAPPING_DATA) {
            let (Some(nonce), Ok(terminal_mapping)) =
                (&self.pace.nonce, EcPoint::from_uncompressed(&terminal_mapping))
            else {
                return Response::error(SW_WRONG_DATA);
            };
            let mapping = KeyPair::generate(&generator).unwrap();
            let Ok((_, ephemeral)) = ec::map_nonce(nonce, &terminal_mapping, &mapping) else {
                return Response::error(SW_WRONG_DATA);
            };
            let public = mapping.public_key().to_uncompressed();
            self.pace.mapping = Some(Arc::new(mapping));
            self.pace.ephemeral = Some(Arc::new(ephemeral));
            return reply(tags::MAPPING_DATA_RESPONSE, &public);
        }

        if let Some(terminal_ephemeral) = object(tags::EPHEMERAL_PUBLIC_KEY) {
            let (Some(ephemeral), Ok(terminal_ephemeral)) = (
                &self.pace.ephemeral,
                EcPoint::from_uncompressed(&terminal_ephemeral),
            ) else {
                return Response::error(SW_WRONG_DATA);
            };
            let public = ephemeral.public_key().to_uncompressed();
            self.pace.terminal_ephemeral = Some(terminal_ephemeral);
            return reply(tags::EPHEMERAL_PUBLIC_KEY_RESPONSE, &public);
        }

        if let Some(terminal_token) = object(tags::AUTHENTICATION_TOKEN) {
            let (Some(ephemeral), Some(terminal_ephemeral)) =
                (&self.pace.ephemeral, &self.pace.terminal_ephemeral)
            else {
                return Response::error(SW_WRONG_DATA);
            };
            let shared = ec::shared_secret(ephemeral, terminal_ephemeral).unwrap();
            let shared = shared.x_bytes();
            let key = PaceKey::derive(shared.as_slice());

            let expected = authentication_token(key.mac(), ephemeral.public_key());
            if !symmetric::mac_matches(&expected, &terminal_token) {
                self.reset_security();
                return Response::error(SW_AUTHENTICATION_FAILED);
            }

            let mut token = authentication_token(key.mac(), terminal_ephemeral);
            if self.forged_token {
                token[7] ^= 0x01;
            }
            self.pace = PaceSession::default();
            self.shared_secret = Some(shared);
            self.ssc = SendSequenceCounter::new();
            return reply(tags::AUTHENTICATION_TOKEN_RESPONSE, &token);
        }

        // Step 1: fresh nonce, encrypted under the CAN
        let mut nonce = vec![0u8; 16];
        rng().fill_bytes(&mut nonce);
        let mut encrypted = nonce.clone();
        let password_key = derive_key(self.can.as_bytes(), KeyPurpose::Password);
        symmetric::cbc_encrypt(&password_key, &[0u8; 16], &mut encrypted).unwrap();
        self.pace.nonce = Some(nonce);
        reply(tags::ENCRYPTED_NONCE, &encrypted)
    }

    fn select(&mut self, command: &Command) -> Response {
        match command.p1 {
            0x04 => {
                let Some(aid) = self.files.iter().find_map(|(file, _)| {
                    file.application
                        .as_ref()
                        .filter(|aid| aid.as_bytes() == command.body())
                        .cloned()
                }) else {
                    return Response::error(SW_FILE_NOT_FOUND);
                };
                self.selected_application = Some(aid);
                self.current_file = None;
                Response::success(None)
            }
            0x02 => match self.files.iter().position(|(file, _)| {
                file.application == self.selected_application
                    && file.fid.to_bytes() == command.body()
            }) {
                Some(index) => {
                    self.current_file = Some(index);
                    Response::success(None)
                }
                None => Response::error(SW_FILE_NOT_FOUND),
            },
            _ => Response::error(SW_WRONG_DATA),
        }
    }

    fn read_binary(&mut self, command: &Command) -> Response {
        if let Some(token) = &self.cancel_on_read {
            token.cancel();
        }

        let offset = if command.p1 & 0x80 != 0 {
            let sfid = command.p1 & 0x1F;
            let Some(index) = self.files.iter().position(|(file, _)| {
                file.application == self.selected_application && file.sfid.value() == sfid
            }) else {
                return Response::error(SW_FILE_NOT_FOUND);
            };
            self.current_file = Some(index);
            usize::from(command.p2)
        } else {
            usize::from(u16::from_be_bytes([command.p1, command.p2]))
        };

        let Some(index) = self.current_file else {
            return Response::error(SW_NO_CURRENT_EF);
        };
        let contents = &self.files[index].1;
        if offset > contents.len() {
            return Response::error(SW_WRONG_OFFSET);
        }

        let requested = command.ne().unwrap_or(SHORT_WILDCARD) as usize;
        let limit = self.max_response_data.unwrap_or(usize::MAX);
        let available = contents.len() - offset;

        if available < requested && available <= limit {
            Response::new(Some(contents.slice(offset..)), SW_END_OF_FILE)
        } else {
            let len = requested.min(limit).min(available);
            Response::success(Some(contents.slice(offset..offset + len)))
        }
    }
}

impl CardChannel for SimulatedCard {
    fn transmit(&mut self, command: &Command) -> egk_apdu_core::Result<Response> {
        if self.tag_lost_after.is_some_and(|count| self.transmitted >= count) {
            return Err(TransportError::TagLost.into());
        }
        if command.is_extended()? && !self.config.extended_length {
            return Err(CommandError::ExtendedLengthUnsupported.into());
        }
        self.transmitted += 1;
        let command = &command
            .clone()
            .with_class(logical_channel_class(command.cla, self.config.logical_channel));

        if command.cla & CLA_SECURE_MESSAGING != CLA_SECURE_MESSAGING {
            if self.shared_secret.is_some() {
                // Plain commands end the secure messaging session
                self.reset_security();
            }
            return Ok(self.process(command));
        }

        match self.unprotect_command(command) {
            Ok(plain) => {
                let response = self.process(&plain);
                Ok(self.protect_response(response))
            }
            Err(status) => {
                self.reset_security();
                Ok(Response::error(status))
            }
        }
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

/// Factory handing out one simulated card
#[derive(Debug)]
pub(crate) struct SimulatedFactory {
    card: Option<SimulatedCard>,
    available: bool,
    enabled: bool,
    blocking: bool,
    discovery_stopped: Arc<AtomicBool>,
}

impl SimulatedFactory {
    /// Factory presenting `card` immediately
    pub(crate) fn new(card: SimulatedCard) -> Self {
        Self {
            card: Some(card),
            available: true,
            enabled: true,
            blocking: false,
            discovery_stopped: Arc::default(),
        }
    }

    /// Factory without a card, discovery runs until timeout or cancellation
    pub(crate) fn empty() -> Self {
        Self {
            card: None,
            ..Self::new(SimulatedCard::new("000000"))
        }
    }

    /// Transport not present
    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            enabled: false,
            ..Self::empty()
        }
    }

    /// Transport present but switched off
    pub(crate) fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::empty()
        }
    }

    /// Never present the card, discovery runs until cancelled
    pub(crate) fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Let the card cancel `token` when it receives READ BINARY
    pub(crate) fn cancel_on_read(&mut self, token: CancellationToken) {
        if let Some(card) = &mut self.card {
            card.cancel_on_read = Some(token);
        }
    }

    /// Set once `stop_discovery` was called
    pub(crate) fn discovery_stopped(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.discovery_stopped)
    }
}

impl ChannelFactory for SimulatedFactory {
    type Tag = ();
    type Channel = SimulatedCard;

    fn is_available(&self) -> bool {
        self.available
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn discover(
        &mut self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        let started = Instant::now();
        loop {
            cancel.check()?;
            if self.card.is_some() && !self.blocking {
                return Ok(());
            }
            if timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
                return Err(TransportError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn connect(
        &mut self,
        _tag: (),
        config: &ChannelConfig,
    ) -> egk_apdu_core::Result<SimulatedCard> {
        let card = self.card.clone().ok_or(TransportError::NotConnected)?;
        Ok(card.with_channel_config(*config))
    }

    fn stop_discovery(&mut self) {
        self.discovery_stopped.store(true, Ordering::SeqCst);
    }
}
