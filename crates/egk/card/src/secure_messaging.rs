//! Secure messaging after PACE (ISO/IEC 7816-4 with AES-128)
//!
//! [`SecureMessaging`] wraps any [`CardChannel`] and implements the same
//! trait, so file access code never sees whether the channel is protected.
//!
//! Commands become `CLA|0C INS P1 P2 [DO87] [DO97] DO8E Le`, responses are
//! expected as `[DO87|DO81] DO99 DO8E`. The send sequence counter is advanced
//! once before each protected command and once before each protected response.

use std::fmt;

use bytes::Bytes;
use egk_apdu_core::command::{EXTENDED_WILDCARD, ExpectedLength, MAX_SHORT_DATA, SHORT_WILDCARD};
use egk_apdu_core::channel::logical_channel_class;
use egk_apdu_core::{CardChannel, Command, Response, SecureChannelError, StatusWord};
use tracing::{debug, instrument, trace, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::tags;
use crate::crypto::symmetric::{self, CipherError};
use crate::crypto::{AES_BLOCK_LEN, MAC_LEN};
use crate::pace::PaceKey;

/// Class byte bits announcing a protected command
pub const CLA_SECURE_MESSAGING: u8 = 0x0C;

/// Worst case growth of a response under protection:
/// DO87 header and padding, DO99 and DO8E
pub const RESPONSE_OVERHEAD: usize = 35;

/// Padding indicator of DO87: ISO/IEC 7816-4 padding
const PADDING_INDICATOR: u8 = 0x01;

/// 128-bit send sequence counter
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SendSequenceCounter([u8; AES_BLOCK_LEN]);

impl SendSequenceCounter {
    /// Counter at zero, the value right after PACE
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter with an explicit value
    pub const fn from_bytes(value: [u8; AES_BLOCK_LEN]) -> Self {
        Self(value)
    }

    /// Big endian increment, wrapping to zero after all ones
    pub fn increment(&mut self) {
        for byte in self.0.iter_mut().rev() {
            let (next, overflow) = byte.overflowing_add(1);
            *byte = next;
            if !overflow {
                break;
            }
        }
    }

    /// Current value
    pub const fn as_bytes(&self) -> &[u8; AES_BLOCK_LEN] {
        &self.0
    }

    /// IV for the next encryption: `E(K_enc, SSC)`
    pub(crate) fn iv(&self, key: &PaceKey) -> [u8; AES_BLOCK_LEN] {
        symmetric::ecb_encrypt_block(key.enc(), &self.0)
    }

    /// CMAC over `SSC || data`, padded
    pub(crate) fn mac(&self, key: &PaceKey, data: &[u8]) -> [u8; MAC_LEN] {
        let mut input = Vec::with_capacity(AES_BLOCK_LEN + data.len() + AES_BLOCK_LEN);
        input.extend_from_slice(&self.0);
        input.extend_from_slice(data);
        symmetric::pad(&mut input);
        symmetric::cmac8(key.mac(), &input)
    }
}

impl fmt::Debug for SendSequenceCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SendSequenceCounter({})", hex::encode(self.0))
    }
}

/// One data object of a protected message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DataObject<'a> {
    pub(crate) tag: u8,
    pub(crate) value: &'a [u8],
    /// Tag, length and value as received, the MAC input
    pub(crate) raw: &'a [u8],
}

/// Split a protected body into single byte tag data objects
pub(crate) fn parse_data_objects(data: &[u8]) -> Result<Vec<DataObject<'_>>, SecureChannelError> {
    let mut objects = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let start = offset;
        let tag = data[offset];
        offset += 1;

        let (len, header) = match data.get(offset..) {
            Some([len @ 0x00..=0x7F, ..]) => (usize::from(*len), 1),
            Some([0x81, len, ..]) => (usize::from(*len), 2),
            Some([0x82, hi, lo, ..]) => (usize::from(u16::from_be_bytes([*hi, *lo])), 3),
            _ => return Err(SecureChannelError::MalformedDataObject("invalid length field")),
        };
        offset += header;

        let value = data
            .get(offset..offset + len)
            .ok_or(SecureChannelError::MalformedDataObject("truncated value"))?;
        offset += len;

        objects.push(DataObject {
            tag,
            value,
            raw: &data[start..offset],
        });
    }

    Ok(objects)
}

/// Append `tag || BER length || value`
pub(crate) fn push_data_object(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    match value.len() {
        len @ 0..=0x7F => out.push(len as u8),
        len @ 0x80..=0xFF => out.extend_from_slice(&[0x81, len as u8]),
        len => {
            out.push(0x82);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
    }
    out.extend_from_slice(value);
}

/// Value of DO97 for an expected length
fn expected_length_value(ne: ExpectedLength) -> Vec<u8> {
    if ne <= SHORT_WILDCARD {
        vec![(ne % SHORT_WILDCARD) as u8]
    } else {
        ((ne % EXTENDED_WILDCARD) as u16).to_be_bytes().to_vec()
    }
}

/// Encrypt `plain` into a DO87 value: padding indicator and cryptogram
pub(crate) fn encrypt_data(
    key: &PaceKey,
    ssc: &SendSequenceCounter,
    plain: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let mut cryptogram = symmetric::padded(plain);
    symmetric::cbc_encrypt(key.enc(), &ssc.iv(key), &mut cryptogram)?;
    let mut value = Vec::with_capacity(1 + cryptogram.len());
    value.push(PADDING_INDICATOR);
    value.extend_from_slice(&cryptogram);
    Ok(value)
}

/// Decrypt a DO87 value and strip the padding
pub(crate) fn decrypt_data(
    key: &PaceKey,
    ssc: &SendSequenceCounter,
    value: &[u8],
) -> Result<Vec<u8>, SecureChannelError> {
    let (&indicator, cryptogram) = value
        .split_first()
        .ok_or(SecureChannelError::MalformedDataObject("empty encrypted data"))?;
    if indicator != PADDING_INDICATOR {
        return Err(SecureChannelError::UnsupportedPaddingIndicator(indicator));
    }

    let mut plain = cryptogram.to_vec();
    symmetric::cbc_decrypt(key.enc(), &ssc.iv(key), &mut plain)
        .map_err(|_| SecureChannelError::MalformedDataObject("cryptogram not block aligned"))?;
    let len = symmetric::unpad(&plain)
        .map_err(|_| SecureChannelError::InvalidPadding)?
        .len();
    plain.truncate(len);
    Ok(plain)
}

/// Secure messaging channel
///
/// Any failure other than [`SecureChannelError::ApduAlreadyEncrypted`] leaves
/// the send sequence counters of both sides out of step, so the keys are
/// zeroed and every later exchange fails with
/// [`SecureChannelError::SessionInvalidated`].
pub struct SecureMessaging<C: CardChannel> {
    inner: C,
    keys: Option<PaceKey>,
    ssc: SendSequenceCounter,
}

impl<C: CardChannel> fmt::Debug for SecureMessaging<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureMessaging")
            .field("inner", &self.inner)
            .field("established", &self.is_established())
            .field("ssc", &self.ssc)
            .finish()
    }
}

impl<C: CardChannel> SecureMessaging<C> {
    /// Protect all traffic on `inner` with the keys from PACE
    pub fn new(inner: C, keys: PaceKey) -> Self {
        Self {
            inner,
            keys: Some(keys),
            ssc: SendSequenceCounter::new(),
        }
    }

    /// Whether the session keys are still present
    pub const fn is_established(&self) -> bool {
        self.keys.is_some()
    }

    /// Current send sequence counter
    pub const fn send_sequence_counter(&self) -> &SendSequenceCounter {
        &self.ssc
    }

    /// Zero the keys and the counter. The channel cannot be used afterwards.
    pub fn invalidate(&mut self) {
        if self.keys.take().is_some() {
            debug!("Secure messaging session invalidated");
        }
        self.ssc.zeroize();
    }

    /// The wrapped channel
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Drop the keys and return the wrapped channel
    pub fn into_inner(mut self) -> C {
        self.invalidate();
        let Self { inner, .. } = self;
        inner
    }

    /// Encrypt and MAC a plain command
    pub fn protect(&mut self, command: &Command) -> Result<Command, SecureChannelError> {
        if command.cla & CLA_SECURE_MESSAGING == CLA_SECURE_MESSAGING {
            return Err(SecureChannelError::ApduAlreadyEncrypted);
        }
        let keys = self.keys.as_ref().ok_or(SecureChannelError::SessionInvalidated)?;
        self.ssc.increment();

        // The MAC covers the CLA as sent, logical channel bits included
        let cla = logical_channel_class(command.cla, self.inner.logical_channel())
            | CLA_SECURE_MESSAGING;
        let header = symmetric::padded(&[cla, command.ins, command.p1, command.p2]);

        let mut objects = Vec::new();
        if !command.body().is_empty() {
            let value = encrypt_data(keys, &self.ssc, command.body())
                .map_err(|_| {
                    SecureChannelError::MalformedDataObject("cryptogram not block aligned")
                })?;
            push_data_object(&mut objects, tags::SM_ENCRYPTED_DATA, &value);
        }
        if let Some(ne) = command.ne() {
            push_data_object(&mut objects, tags::SM_EXPECTED_LENGTH, &expected_length_value(ne));
        }

        let mut mac_input = header;
        mac_input.extend_from_slice(&objects);
        let mac = self.ssc.mac(keys, &mac_input);
        push_data_object(&mut objects, tags::SM_MAC, &mac);

        let extended =
            objects.len() > MAX_SHORT_DATA || command.ne().is_some_and(|ne| ne > SHORT_WILDCARD);
        let le = if extended { EXTENDED_WILDCARD } else { SHORT_WILDCARD };

        Ok(Command::new(cla, command.ins, command.p1, command.p2)
            .with_data(objects)
            .with_le(le))
    }

    /// Verify and decrypt a protected response
    pub fn unprotect(&mut self, response: &Response) -> Result<Response, SecureChannelError> {
        // Cards answer some errors without protection
        if response.data().is_empty() && !response.is_success() {
            debug!(status = %response.status(), "Unprotected error status");
            return Ok(response.clone());
        }

        let keys = self.keys.as_ref().ok_or(SecureChannelError::SessionInvalidated)?;
        self.ssc.increment();

        let objects = parse_data_objects(response.data())?;
        let mac_index = objects
            .iter()
            .position(|object| object.tag == tags::SM_MAC)
            .ok_or(SecureChannelError::MissingDataObject(tags::SM_MAC))?;
        let received_mac = objects[mac_index].value;
        if received_mac.len() != MAC_LEN {
            return Err(SecureChannelError::MalformedDataObject("MAC must be 8 bytes"));
        }

        let mac_input: Vec<u8> = objects[..mac_index]
            .iter()
            .flat_map(|object| object.raw.iter().copied())
            .collect();
        if !symmetric::mac_matches(&self.ssc.mac(keys, &mac_input), received_mac) {
            return Err(SecureChannelError::MacVerificationFailed);
        }

        let status = objects
            .iter()
            .find(|object| object.tag == tags::SM_STATUS)
            .ok_or(SecureChannelError::MissingDataObject(tags::SM_STATUS))?;
        let status = match status.value {
            [sw1, sw2] => StatusWord::new(*sw1, *sw2),
            _ => return Err(SecureChannelError::MalformedDataObject("status must be 2 bytes")),
        };
        if status != response.status() {
            warn!(
                protected = %status,
                plain = %response.status(),
                "Protected status differs from the plain status word"
            );
        }

        let data = match objects
            .iter()
            .find(|object| matches!(object.tag, tags::SM_ENCRYPTED_DATA | tags::SM_PLAIN_DATA))
        {
            Some(object) if object.tag == tags::SM_ENCRYPTED_DATA => {
                decrypt_data(keys, &self.ssc, object.value)?
            }
            Some(object) => object.value.to_vec(),
            None => Vec::new(),
        };

        trace!(len = data.len(), status = %status, "Response unprotected");
        Ok(Response::new(Some(Bytes::from(data)), status))
    }

    fn exchange(&mut self, command: &Command) -> egk_apdu_core::Result<Response> {
        let protected = self.protect(command)?;
        let response = self.inner.transmit(&protected)?;
        Ok(self.unprotect(&response)?)
    }
}

impl<C: CardChannel> CardChannel for SecureMessaging<C> {
    #[instrument(level = "trace", skip_all, fields(command = %command))]
    fn transmit(&mut self, command: &Command) -> egk_apdu_core::Result<Response> {
        let result = self.exchange(command);
        if let Err(err) = &result {
            let recoverable = matches!(
                err,
                egk_apdu_core::Error::SecureChannel(SecureChannelError::ApduAlreadyEncrypted)
            );
            if !recoverable {
                warn!(error = %err, "Secure messaging exchange failed");
                self.invalidate();
            }
        }
        result
    }

    fn max_transceive_length(&self) -> usize {
        self.inner
            .max_transceive_length()
            .saturating_sub(RESPONSE_OVERHEAD)
    }

    fn supports_extended_length(&self) -> bool {
        self.inner.supports_extended_length()
    }

    fn logical_channel(&self) -> u8 {
        self.inner.logical_channel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SimulatedCard, established};
    use egk_apdu_core::ChannelConfig;
    use egk_apdu_core::transport::TransportError;

    #[test]
    fn test_counter_rollover() {
        let mut ssc = SendSequenceCounter::from_bytes([0xFF; 16]);
        ssc.increment();
        assert_eq!(ssc.as_bytes(), &[0u8; 16]);

        let mut ssc = SendSequenceCounter::from_bytes([
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xFF,
        ]);
        ssc.increment();
        assert_eq!(ssc.as_bytes()[14..], [0x02, 0x00]);

        let mut ssc = SendSequenceCounter::new();
        ssc.increment();
        assert_eq!(ssc.as_bytes()[15], 1);
    }

    #[test]
    fn test_data_object_lengths() {
        for len in [0usize, 1, 0x7F, 0x80, 0xFF, 0x100, 0x1234] {
            let value = vec![0xAB; len];
            let mut encoded = Vec::new();
            push_data_object(&mut encoded, 0x87, &value);
            let objects = parse_data_objects(&encoded).unwrap();
            assert_eq!(objects.len(), 1);
            assert_eq!(objects[0].value.len(), len);
            assert_eq!(objects[0].raw, &encoded[..]);
        }
        assert!(parse_data_objects(&[0x87, 0x05, 0x01]).is_err());
        assert!(parse_data_objects(&[0x87, 0x83, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_expected_length_value() {
        assert_eq!(expected_length_value(1), [0x01]);
        assert_eq!(expected_length_value(256), [0x00]);
        assert_eq!(expected_length_value(257), [0x01, 0x01]);
        assert_eq!(expected_length_value(65_536), [0x00, 0x00]);
    }

    #[test]
    fn test_protected_command_layout() {
        let (mut sm, _) = established(SimulatedCard::new("123456"));
        let protected = sm
            .protect(&Command::new_with_data_and_le(0x00, 0xA4, 0x02, 0x0C, vec![0xD0, 0x01], 0))
            .unwrap();

        assert_eq!(protected.cla, 0x0C);
        assert_eq!(protected.ne(), Some(SHORT_WILDCARD));
        let objects = parse_data_objects(protected.body()).unwrap();
        let tags: Vec<u8> = objects.iter().map(|object| object.tag).collect();
        assert_eq!(tags, [0x87, 0x8E]);
        assert_eq!(objects[0].value.len(), 17);
        assert_eq!(objects[0].value[0], 0x01);
        assert_eq!(sm.send_sequence_counter().as_bytes()[15], 1);
    }

    #[test]
    fn test_large_expected_length_forces_extended() {
        let (mut sm, _) = established(SimulatedCard::new("123456"));
        let protected = sm
            .protect(&Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 1000))
            .unwrap();
        assert_eq!(protected.ne(), Some(EXTENDED_WILDCARD));
        let objects = parse_data_objects(protected.body()).unwrap();
        assert_eq!(objects[0].tag, 0x97);
        assert_eq!(objects[0].value, [0x03, 0xE8]);
    }

    #[test]
    fn test_round_trip_through_card() {
        for len in [0usize, 1, 15, 16, 200] {
            let (mut sm, _) = established(SimulatedCard::new("123456"));
            let body: Vec<u8> = (0..len).map(|i| i as u8).collect();
            // INS 0xEE is echoed back by the simulated card
            let command = Command::new_with_data_and_le(0x00, 0xEE, 0x00, 0x00, body.clone(), 256);
            let response = sm.transmit(&command).unwrap();
            assert!(response.is_success(), "{len}");
            assert_eq!(response.data(), &body[..], "{len}");
            assert_eq!(sm.send_sequence_counter().as_bytes()[15], 2, "{len}");
        }
    }

    #[test]
    fn test_mac_covers_logical_channel() {
        let card = SimulatedCard::new("123456")
            .with_channel_config(ChannelConfig::new().with_logical_channel(2));
        let (mut sm, _) = established(card);
        assert_eq!(sm.logical_channel(), 2);

        let response = sm
            .transmit(&Command::new_with_data_and_le(0x00, 0xEE, 0x00, 0x00, vec![0x42], 256))
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.data(), &[0x42]);
        assert!(sm.is_established());
        // The card unwraps to the plain CLA of logical channel 2
        assert_eq!(sm.inner().commands().last().map(|command| command.cla), Some(0x02));
    }

    #[test]
    fn test_counters_stay_in_step() {
        let (mut sm, _) = established(SimulatedCard::new("123456"));
        for i in 0..5u8 {
            let response = sm
                .transmit(&Command::new_with_data_and_le(0x00, 0xEE, 0x00, 0x00, vec![i], 256))
                .unwrap();
            assert_eq!(response.data(), &[i]);
        }
        assert_eq!(sm.send_sequence_counter().as_bytes()[15], 10);
    }

    #[test]
    fn test_already_encrypted_is_not_fatal() {
        let (mut sm, _) = established(SimulatedCard::new("123456"));
        let err = sm.transmit(&Command::new(0x0C, 0xB0, 0x00, 0x00)).unwrap_err();
        assert_eq!(
            err,
            egk_apdu_core::Error::SecureChannel(SecureChannelError::ApduAlreadyEncrypted)
        );
        assert!(sm.is_established());
        assert_eq!(sm.send_sequence_counter(), &SendSequenceCounter::new());
    }

    #[test]
    fn test_tampered_response_invalidates_session() {
        let (mut sm, _) = established(SimulatedCard::new("123456").with_tampered_responses());
        let err = sm
            .transmit(&Command::new_with_data_and_le(0x00, 0xEE, 0x00, 0x00, vec![1, 2, 3], 256))
            .unwrap_err();
        assert_eq!(
            err,
            egk_apdu_core::Error::SecureChannel(SecureChannelError::MacVerificationFailed)
        );
        assert!(!sm.is_established());

        let err = sm.transmit(&Command::new(0x00, 0xEE, 0x00, 0x00)).unwrap_err();
        assert_eq!(
            err,
            egk_apdu_core::Error::SecureChannel(SecureChannelError::SessionInvalidated)
        );
    }

    #[test]
    fn test_transport_loss_invalidates_session() {
        let (mut sm, sent) = established(SimulatedCard::new("123456"));
        let mut sm = {
            let card = sm.inner().clone().with_tag_lost_after(sent);
            let keys = card.session_key().unwrap();
            sm.invalidate();
            SecureMessaging::new(card, keys)
        };
        let err = sm.transmit(&Command::new(0x00, 0xEE, 0x00, 0x00)).unwrap_err();
        assert_eq!(
            err,
            egk_apdu_core::Error::Transport(TransportError::TagLost)
        );
        assert!(!sm.is_established());
    }

    #[test]
    fn test_unprotected_error_passes_through() {
        let (mut sm, _) = established(SimulatedCard::new("123456"));
        let response = sm.unprotect(&Response::error((0x69, 0x88))).unwrap();
        assert_eq!(response.status(), StatusWord::new(0x69, 0x88));
        assert_eq!(sm.send_sequence_counter(), &SendSequenceCounter::new());
    }

    #[test]
    fn test_missing_status_object() {
        let (mut sm, _) = established(SimulatedCard::new("123456"));
        let mut ssc = sm.send_sequence_counter().clone();
        ssc.increment();
        let keys = sm.inner().session_key().unwrap();

        let mut body = Vec::new();
        push_data_object(&mut body, tags::SM_PLAIN_DATA, &[1, 2]);
        let mac = ssc.mac(&keys, &body);
        push_data_object(&mut body, tags::SM_MAC, &mac);

        let err = sm.unprotect(&Response::success(Some(body.into()))).unwrap_err();
        assert_eq!(err, SecureChannelError::MissingDataObject(0x99));
    }

    #[test]
    fn test_reduced_transceive_length() {
        let card =
            SimulatedCard::new("123456").with_channel_config(ChannelConfig::new().short_only());
        let (sm, _) = established(card);
        assert_eq!(sm.max_transceive_length(), 258 - RESPONSE_OVERHEAD);
        assert!(!sm.supports_extended_length());
    }
}
