//! MANAGE SECURITY ENVIRONMENT: SET for mutual authentication

use bytes::Bytes;
use egk_apdu_core::{ApduCommand, StatusTable};
use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::constants::tags;
use crate::status::{self, ResponseStatus};
use crate::types::KeyReference;

/// Instruction byte of MANAGE SECURITY ENVIRONMENT
pub const INS_MANAGE_SECURITY_ENVIRONMENT: u8 = 0x22;
/// P1: SET for internal and external authentication
pub const P1_SET_AUTHENTICATION: u8 = 0xC1;
/// P2: authentication template
pub const P2_AUTHENTICATION_TEMPLATE: u8 = 0xA4;

/// MSE:SET AT selecting a PACE protocol and password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MseSetAtCommand {
    data: Bytes,
}

impl MseSetAtCommand {
    /// Select `protocol` (OID content bytes) with the given password
    pub fn pace(protocol: &[u8], password: KeyReference) -> Result<Self, iso7816_tlv::TlvError> {
        let mechanism = Tlv::new(
            Tag::try_from(tags::CRYPTOGRAPHIC_MECHANISM)?,
            Value::Primitive(protocol.to_vec()),
        )?;
        let reference = Tlv::new(
            Tag::try_from(tags::PASSWORD_REFERENCE)?,
            Value::Primitive(vec![password.global()]),
        )?;

        let mut data = mechanism.to_vec();
        data.extend(reference.to_vec());
        Ok(Self { data: data.into() })
    }
}

impl ApduCommand for MseSetAtCommand {
    type Status = ResponseStatus;

    fn instruction(&self) -> u8 {
        INS_MANAGE_SECURITY_ENVIRONMENT
    }

    fn p1(&self) -> u8 {
        P1_SET_AUTHENTICATION
    }

    fn p2(&self) -> u8 {
        P2_AUTHENTICATION_TEMPLATE
    }

    fn data(&self) -> Option<Bytes> {
        Some(self.data.clone())
    }

    fn status_table() -> &'static StatusTable<ResponseStatus> {
        &status::MANAGE_SECURITY_ENVIRONMENT
    }
}
