//! File system layout and protocol constants of the health card

use crate::types::{
    ApplicationIdentifier, FileDescriptor, FileIdentifier, KeyReference, ShortFileIdentifier,
};

/// DF.HCA, the health care application
pub const HCA_AID: ApplicationIdentifier =
    ApplicationIdentifier::from_static(&[0xD2, 0x76, 0x00, 0x00, 0x01, 0x02]);

/// EF.PD, personal data of the insured person
pub const EF_PD: FileDescriptor = FileDescriptor::new(
    HCA_AID,
    FileIdentifier::from_static(0xD001),
    ShortFileIdentifier::from_static(0x01),
);

/// EF.VD, insurance data (VD) and protected insurance data (GVD)
pub const EF_VD: FileDescriptor = FileDescriptor::new(
    HCA_AID,
    FileIdentifier::from_static(0xD002),
    ShortFileIdentifier::from_static(0x02),
);

/// EF.StatusVD, update status of EF.VD
pub const EF_STATUS_VD: FileDescriptor = FileDescriptor::new(
    HCA_AID,
    FileIdentifier::from_static(0xD00C),
    ShortFileIdentifier::from_static(0x0C),
);

/// EF.CardAccess, PACE parameters published in the master file
pub const EF_CARD_ACCESS: FileDescriptor = FileDescriptor::in_master_file(
    FileIdentifier::from_static(0x011C),
    ShortFileIdentifier::from_static(0x1C),
);

/// Password reference of the CAN
pub const CAN_PASSWORD_REFERENCE: KeyReference = KeyReference::Password(2);

/// Object identifiers
pub mod oid {
    /// id-PACE-ECDH-GM-AES-CBC-CMAC-128 (0.4.0.127.0.7.2.2.4.2.2), DER content bytes
    pub const PACE_ECDH_GM_AES_CBC_CMAC_128: &[u8] =
        &[0x04, 0x00, 0x7F, 0x00, 0x07, 0x02, 0x02, 0x04, 0x02, 0x02];
}

/// Data object tags
pub mod tags {
    /// Cryptographic mechanism reference (MSE:SET AT)
    pub const CRYPTOGRAPHIC_MECHANISM: u8 = 0x80;
    /// Password reference (MSE:SET AT)
    pub const PASSWORD_REFERENCE: u8 = 0x83;

    /// Dynamic authentication data template (GENERAL AUTHENTICATE)
    pub const DYNAMIC_AUTHENTICATION_DATA: u8 = 0x7C;
    /// Encrypted nonce, card to terminal
    pub const ENCRYPTED_NONCE: u8 = 0x80;
    /// Mapping data, terminal to card
    pub const MAPPING_DATA: u8 = 0x81;
    /// Mapping data, card to terminal
    pub const MAPPING_DATA_RESPONSE: u8 = 0x82;
    /// Ephemeral public key, terminal to card
    pub const EPHEMERAL_PUBLIC_KEY: u8 = 0x83;
    /// Ephemeral public key, card to terminal
    pub const EPHEMERAL_PUBLIC_KEY_RESPONSE: u8 = 0x84;
    /// Authentication token, terminal to card
    pub const AUTHENTICATION_TOKEN: u8 = 0x85;
    /// Authentication token, card to terminal
    pub const AUTHENTICATION_TOKEN_RESPONSE: u8 = 0x86;

    /// Public key template of the authentication token input, two bytes
    pub const PUBLIC_KEY_TEMPLATE: [u8; 2] = [0x7F, 0x49];
    /// Object identifier
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    /// Elliptic curve point inside a public key template
    pub const EC_POINT: u8 = 0x86;

    /// Padding indicator followed by a cryptogram
    pub const SM_ENCRYPTED_DATA: u8 = 0x87;
    /// Plain value not BER-TLV encoded
    pub const SM_PLAIN_DATA: u8 = 0x81;
    /// Protected Le
    pub const SM_EXPECTED_LENGTH: u8 = 0x97;
    /// Processing status
    pub const SM_STATUS: u8 = 0x99;
    /// Cryptographic checksum
    pub const SM_MAC: u8 = 0x8E;
}
