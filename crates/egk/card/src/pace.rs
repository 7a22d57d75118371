//! PACE key agreement (ECDH, generic mapping, AES-128)
//!
//! The terminal runs four GENERAL AUTHENTICATE exchanges after MSE:SET AT:
//!
//! 1. receive the nonce `z`, encrypted under a key derived from the CAN
//! 2. exchange mapping keys and compute the mapped generator `G~`
//! 3. exchange ephemeral keys over `G~` and derive the session keys
//! 4. exchange authentication tokens
//!
//! A wrong CAN is only detected in step 4, when the card rejects the
//! terminal token.

use std::fmt;

use egk_apdu_core::{ApduCommand, CardChannel, Response, StatusWord};
use tracing::{debug, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::commands::{
    DynamicAuthenticationDataError, GeneralAuthenticateCommand, MseSetAtCommand,
    dynamic_authentication_data,
};
use crate::constants::{CAN_PASSWORD_REFERENCE, oid, tags};
use crate::crypto::ec::{self, EcError, EcPoint, KeyPair};
use crate::crypto::kdf::{KeyPurpose, derive_key};
use crate::crypto::symmetric::{self, CipherError};
use crate::crypto::{AES_BLOCK_LEN, AesKey, MAC_LEN};
use crate::status::ResponseStatus;
use crate::types::CardAccessNumber;

/// Progress of a PACE run
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PaceState {
    /// Nothing sent yet
    Init,
    /// MSE:SET AT accepted
    SecurityEnvironmentSet,
    /// Nonce received and decrypted
    NonceReceived,
    /// Mapping and ephemeral keys exchanged
    MappingExchanged,
    /// Session keys derived
    KeyDerived,
    /// Both tokens verified
    Verified,
    /// The run failed and cannot be resumed
    Failed,
}

/// PACE failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaceError {
    /// The channel failed, including cancellation and transport loss
    #[error(transparent)]
    Channel(#[from] egk_apdu_core::Error),

    /// The card answered a step with an unexpected status word
    #[error("Step {step} failed with status {status} ({outcome})")]
    UnexpectedStatus {
        /// State the run was in when the step was sent
        step: PaceState,
        /// Raw status word
        status: StatusWord,
        /// Meaning of the status word for GENERAL AUTHENTICATE or MSE
        outcome: ResponseStatus,
    },

    /// The card rejected the terminal token, the CAN is wrong
    #[error("Card rejected the terminal authentication token ({0})")]
    MacPcdVerificationFailedOnCard(StatusWord),

    /// The card token does not match the locally computed one
    #[error("Card authentication token verification failed")]
    MacPiccVerificationFailedLocally,

    /// Card and terminal ephemeral keys are identical
    #[error("Card reflected the terminal ephemeral public key")]
    ReflectedPublicKey,

    /// Encrypted nonce has an invalid length
    #[error("Encrypted nonce of {0} bytes is not block aligned")]
    InvalidNonceLength(usize),

    /// Malformed GENERAL AUTHENTICATE data
    #[error(transparent)]
    AuthenticationData(#[from] DynamicAuthenticationDataError),

    /// Elliptic curve failure, including a degenerate mapping
    #[error(transparent)]
    Ec(#[from] EcError),

    /// Block cipher failure
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl From<iso7816_tlv::TlvError> for PaceError {
    fn from(err: iso7816_tlv::TlvError) -> Self {
        DynamicAuthenticationDataError::from(err).into()
    }
}

/// Session keys negotiated by PACE
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PaceKey {
    enc: AesKey,
    mac: AesKey,
}

impl PaceKey {
    /// Derive both session keys from the shared secret
    pub fn derive(shared_secret: &[u8]) -> Self {
        Self {
            enc: *derive_key(shared_secret, KeyPurpose::Encryption),
            mac: *derive_key(shared_secret, KeyPurpose::Mac),
        }
    }

    pub(crate) const fn enc(&self) -> &AesKey {
        &self.enc
    }

    pub(crate) const fn mac(&self) -> &AesKey {
        &self.mac
    }
}

impl fmt::Debug for PaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PaceKey(<redacted>)")
    }
}

/// Authentication token: CMAC over the public key data object of `public_key`
pub fn authentication_token(mac_key: &AesKey, public_key: &EcPoint) -> [u8; MAC_LEN] {
    let point = public_key.to_uncompressed();

    let mut inner =
        Vec::with_capacity(2 + oid::PACE_ECDH_GM_AES_CBC_CMAC_128.len() + 2 + point.len());
    inner.push(tags::OBJECT_IDENTIFIER);
    inner.push(oid::PACE_ECDH_GM_AES_CBC_CMAC_128.len() as u8);
    inner.extend_from_slice(oid::PACE_ECDH_GM_AES_CBC_CMAC_128);
    inner.push(tags::EC_POINT);
    inner.push(point.len() as u8);
    inner.extend_from_slice(&point);

    let mut input = Vec::with_capacity(3 + inner.len());
    input.extend_from_slice(&tags::PUBLIC_KEY_TEMPLATE);
    input.push(inner.len() as u8);
    input.extend_from_slice(&inner);

    symmetric::cmac8(mac_key, &input)
}

/// Decrypt the PACE nonce with the key derived from the CAN
pub fn decrypt_nonce(
    can: &CardAccessNumber,
    encrypted: &[u8],
) -> Result<Zeroizing<Vec<u8>>, PaceError> {
    if encrypted.is_empty() || encrypted.len() % AES_BLOCK_LEN != 0 {
        return Err(PaceError::InvalidNonceLength(encrypted.len()));
    }
    let key = derive_key(can.as_bytes(), KeyPurpose::Password);
    let mut nonce = Zeroizing::new(encrypted.to_vec());
    symmetric::cbc_decrypt(&key, &[0u8; AES_BLOCK_LEN], &mut nonce)?;
    Ok(nonce)
}

/// Terminal side of PACE over a plain channel
pub struct Pace<'c, C: CardChannel> {
    channel: &'c mut C,
    state: PaceState,
}

impl<C: CardChannel> fmt::Debug for Pace<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pace").field("state", &self.state).finish()
    }
}

impl<'c, C: CardChannel> Pace<'c, C> {
    /// Prepare a run over `channel`
    pub fn new(channel: &'c mut C) -> Self {
        Self {
            channel,
            state: PaceState::Init,
        }
    }

    /// Current progress
    pub const fn state(&self) -> PaceState {
        self.state
    }

    /// Run all steps and return the session keys
    ///
    /// No step is retried. On failure the run ends in [`PaceState::Failed`].
    #[instrument(level = "debug", skip_all)]
    pub fn establish(&mut self, can: &CardAccessNumber) -> Result<PaceKey, PaceError> {
        match self.run(can) {
            Ok(key) => Ok(key),
            Err(err) => {
                warn!(state = %self.state, error = %err, "PACE failed");
                self.state = PaceState::Failed;
                Err(err)
            }
        }
    }

    fn advance(&mut self, state: PaceState) {
        debug!(from = %self.state, to = %state, "PACE step completed");
        self.state = state;
    }

    fn run(&mut self, can: &CardAccessNumber) -> Result<PaceKey, PaceError> {
        let generator = EcPoint::generator();

        // MSE:SET AT
        let command =
            MseSetAtCommand::pace(oid::PACE_ECDH_GM_AES_CBC_CMAC_128, CAN_PASSWORD_REFERENCE)?;
        let response = self.channel.transmit(&command.to_command())?;
        self.require_success::<MseSetAtCommand>(&response)?;
        self.advance(PaceState::SecurityEnvironmentSet);

        // Step 1: encrypted nonce
        let response = self.authenticate(GeneralAuthenticateCommand::encrypted_nonce()?)?;
        let encrypted = dynamic_authentication_data(response.data(), tags::ENCRYPTED_NONCE)?;
        let nonce = decrypt_nonce(can, &encrypted)?;
        self.advance(PaceState::NonceReceived);

        // Step 2: generic mapping
        let mapping_pair = KeyPair::generate(&generator)?;
        let response = self.authenticate(GeneralAuthenticateCommand::map_nonce(
            &mapping_pair.public_key().to_uncompressed(),
        )?)?;
        let card_mapping_key = EcPoint::from_uncompressed(&dynamic_authentication_data(
            response.data(),
            tags::MAPPING_DATA_RESPONSE,
        )?)?;
        let (mapped, ephemeral_pair) = ec::map_nonce(&nonce, &card_mapping_key, &mapping_pair)?;
        drop(mapping_pair);

        // Step 3: key agreement over the mapped generator
        let response = self.authenticate(GeneralAuthenticateCommand::key_agreement(
            &ephemeral_pair.public_key().to_uncompressed(),
        )?)?;
        let card_ephemeral_key = EcPoint::from_uncompressed(&dynamic_authentication_data(
            response.data(),
            tags::EPHEMERAL_PUBLIC_KEY_RESPONSE,
        )?)?;
        if &card_ephemeral_key == ephemeral_pair.public_key() {
            return Err(PaceError::ReflectedPublicKey);
        }
        debug!(generator = ?mapped.point(), "Ephemeral keys exchanged over mapped generator");
        self.advance(PaceState::MappingExchanged);

        let shared = ec::shared_secret(&ephemeral_pair, &card_ephemeral_key)?;
        let key = PaceKey::derive(shared.x_bytes().as_slice());
        self.advance(PaceState::KeyDerived);

        // Step 4: mutual authentication
        let terminal_token = authentication_token(key.mac(), &card_ephemeral_key);
        let command = GeneralAuthenticateCommand::mutual_authentication(&terminal_token)?;
        let response = self.channel.transmit(&command.to_command())?;
        if !response.is_success() {
            return Err(PaceError::MacPcdVerificationFailedOnCard(response.status()));
        }

        let card_token =
            dynamic_authentication_data(response.data(), tags::AUTHENTICATION_TOKEN_RESPONSE)?;
        let expected = authentication_token(key.mac(), ephemeral_pair.public_key());
        if !symmetric::mac_matches(&expected, &card_token) {
            return Err(PaceError::MacPiccVerificationFailedLocally);
        }
        self.advance(PaceState::Verified);

        Ok(key)
    }

    fn authenticate(&mut self, command: GeneralAuthenticateCommand) -> Result<Response, PaceError> {
        let response = self.channel.transmit(&command.to_command())?;
        self.require_success::<GeneralAuthenticateCommand>(&response)?;
        Ok(response)
    }

    fn require_success<A: ApduCommand<Status = ResponseStatus>>(
        &self,
        response: &Response,
    ) -> Result<(), PaceError> {
        let outcome = A::status_of(response);
        if outcome.is_success() {
            Ok(())
        } else {
            Err(PaceError::UnexpectedStatus {
                step: self.state,
                status: response.status(),
                outcome,
            })
        }
    }
}

/// Run PACE with the CAN over `channel`
pub fn establish<C: CardChannel>(
    channel: &mut C,
    can: &CardAccessNumber,
) -> Result<PaceKey, PaceError> {
    Pace::new(channel).establish(can)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedCard;
    use egk_apdu_core::transport::TransportError;

    fn can(digits: &str) -> CardAccessNumber {
        CardAccessNumber::new(digits).unwrap()
    }

    #[test]
    fn test_both_sides_derive_the_same_keys() {
        let mut card = SimulatedCard::new("123456");
        let mut pace = Pace::new(&mut card);
        let key = pace.establish(&can("123456")).unwrap();
        assert_eq!(pace.state(), PaceState::Verified);

        let card_key = card.session_key().unwrap();
        assert_eq!(key.enc(), card_key.enc());
        assert_eq!(key.mac(), card_key.mac());
        assert_ne!(key.enc(), key.mac());
    }

    #[test]
    fn test_wrong_can_fails_on_card() {
        let mut card = SimulatedCard::new("123456");
        let mut pace = Pace::new(&mut card);
        let err = pace.establish(&can("123457")).unwrap_err();
        assert_eq!(
            err,
            PaceError::MacPcdVerificationFailedOnCard(StatusWord::new(0x63, 0x00))
        );
        assert_eq!(pace.state(), PaceState::Failed);
        assert!(card.session_key().is_none());
    }

    #[test]
    fn test_forged_card_token_is_fatal() {
        let mut card = SimulatedCard::new("123456").with_forged_token();
        let err = establish(&mut card, &can("123456")).unwrap_err();
        assert_eq!(err, PaceError::MacPiccVerificationFailedLocally);
    }

    #[test]
    fn test_unsupported_protocol_status() {
        let mut card = SimulatedCard::new("123456").with_mse_status(0x6A, 0x81);
        let err = establish(&mut card, &can("123456")).unwrap_err();
        assert_eq!(
            err,
            PaceError::UnexpectedStatus {
                step: PaceState::Init,
                status: StatusWord::new(0x6A, 0x81),
                outcome: ResponseStatus::UnsupportedFunction,
            }
        );
    }

    #[test]
    fn test_connection_loss_surfaces() {
        let mut card = SimulatedCard::new("123456").with_tag_lost_after(3);
        let err = establish(&mut card, &can("123456")).unwrap_err();
        assert_eq!(
            err,
            PaceError::Channel(egk_apdu_core::Error::Transport(TransportError::TagLost))
        );
    }

    #[test]
    fn test_token_input_layout() {
        let mac_key = [0x11u8; 16];
        let point = EcPoint::generator();
        let mut input = vec![0x7F, 0x49, 0x4F, 0x06, 0x0A];
        input.extend_from_slice(oid::PACE_ECDH_GM_AES_CBC_CMAC_128);
        input.extend_from_slice(&[0x86, 0x41]);
        input.extend_from_slice(&point.to_uncompressed());
        assert_eq!(
            authentication_token(&mac_key, &point),
            symmetric::cmac8(&mac_key, &input)
        );
    }

    #[test]
    fn test_nonce_length_checked() {
        assert_eq!(
            decrypt_nonce(&can("123456"), &[0u8; 15]).unwrap_err(),
            PaceError::InvalidNonceLength(15)
        );
    }
}
