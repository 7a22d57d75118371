//! GENERAL AUTHENTICATE for the four PACE steps

use bytes::Bytes;
use egk_apdu_core::{ApduCommand, ExpectedLength, StatusTable};
use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::constants::tags;
use crate::status::{self, ResponseStatus};

/// Instruction byte of GENERAL AUTHENTICATE
pub const INS_GENERAL_AUTHENTICATE: u8 = 0x86;
/// CLA with the command chaining bit, used for all but the last step
pub const CLA_CHAINING: u8 = 0x10;

/// Errors building or parsing dynamic authentication data
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DynamicAuthenticationDataError {
    /// BER-TLV encoding failed
    #[error("Malformed dynamic authentication data")]
    Malformed,

    /// The response template lacks the expected data object
    #[error("Missing data object {0:#04X} in dynamic authentication data")]
    MissingDataObject(u8),
}

impl From<iso7816_tlv::TlvError> for DynamicAuthenticationDataError {
    fn from(_: iso7816_tlv::TlvError) -> Self {
        Self::Malformed
    }
}

/// One GENERAL AUTHENTICATE exchange of PACE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralAuthenticateCommand {
    chained: bool,
    data: Bytes,
}

impl GeneralAuthenticateCommand {
    /// Step 1: ask for the encrypted nonce
    pub fn encrypted_nonce() -> Result<Self, DynamicAuthenticationDataError> {
        Self::build(true, None)
    }

    /// Step 2: send the mapping public key
    pub fn map_nonce(public_key: &[u8]) -> Result<Self, DynamicAuthenticationDataError> {
        Self::build(true, Some((tags::MAPPING_DATA, public_key)))
    }

    /// Step 3: send the ephemeral public key over the mapped generator
    pub fn key_agreement(public_key: &[u8]) -> Result<Self, DynamicAuthenticationDataError> {
        Self::build(true, Some((tags::EPHEMERAL_PUBLIC_KEY, public_key)))
    }

    /// Step 4: send the terminal authentication token, ending the chain
    pub fn mutual_authentication(token: &[u8]) -> Result<Self, DynamicAuthenticationDataError> {
        Self::build(false, Some((tags::AUTHENTICATION_TOKEN, token)))
    }

    fn build(
        chained: bool,
        object: Option<(u8, &[u8])>,
    ) -> Result<Self, DynamicAuthenticationDataError> {
        let inner = match object {
            Some((tag, value)) => {
                vec![Tlv::new(Tag::try_from(tag)?, Value::Primitive(value.to_vec()))?]
            }
            None => Vec::new(),
        };
        let template = Tlv::new(
            Tag::try_from(tags::DYNAMIC_AUTHENTICATION_DATA)?,
            Value::Constructed(inner),
        )?;
        Ok(Self {
            chained,
            data: template.to_vec().into(),
        })
    }

    /// Whether the command chaining bit is set
    pub const fn is_chained(&self) -> bool {
        self.chained
    }
}

impl ApduCommand for GeneralAuthenticateCommand {
    type Status = ResponseStatus;

    fn class(&self) -> u8 {
        if self.chained { CLA_CHAINING } else { 0x00 }
    }

    fn instruction(&self) -> u8 {
        INS_GENERAL_AUTHENTICATE
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<Bytes> {
        Some(self.data.clone())
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(egk_apdu_core::command::SHORT_WILDCARD)
    }

    fn status_table() -> &'static StatusTable<ResponseStatus> {
        &status::GENERAL_AUTHENTICATE
    }
}

/// Value of data object `tag` inside a `7C` template
pub fn dynamic_authentication_data(
    data: &[u8],
    tag: u8,
) -> Result<Vec<u8>, DynamicAuthenticationDataError> {
    let template = Tlv::from_bytes(data)?;
    if template.tag() != &Tag::try_from(tags::DYNAMIC_AUTHENTICATION_DATA)? {
        return Err(DynamicAuthenticationDataError::Malformed);
    }
    let Value::Constructed(objects) = template.value() else {
        return Err(DynamicAuthenticationDataError::Malformed);
    };

    let wanted = Tag::try_from(tag)?;
    objects
        .iter()
        .find(|object| object.tag() == &wanted)
        .and_then(|object| match object.value() {
            Value::Primitive(value) => Some(value.clone()),
            Value::Constructed(_) => None,
        })
        .ok_or(DynamicAuthenticationDataError::MissingDataObject(tag))
}
