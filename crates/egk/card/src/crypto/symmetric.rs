//! AES-128 primitives used by PACE and secure messaging

use aes::Aes128;
use cipher::block_padding::NoPadding;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use cmac::{Cmac, Mac};
use subtle::ConstantTimeEq;

use super::{AES_BLOCK_LEN, AesKey, MAC_LEN};

type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

/// Errors of the block cipher helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Input is not a multiple of the AES block size
    #[error("Input of {0} bytes is not block aligned")]
    NotBlockAligned(usize),

    /// No ISO/IEC 7816-4 padding delimiter found
    #[error("Invalid padding")]
    InvalidPadding,
}

/// Append `80 00..` up to the next block boundary
///
/// Padding is always added, so block aligned input grows by a full block.
pub fn pad(data: &mut Vec<u8>) {
    data.push(0x80);
    while data.len() % AES_BLOCK_LEN != 0 {
        data.push(0x00);
    }
}

/// Padded copy of `data`
pub fn padded(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + AES_BLOCK_LEN);
    out.extend_from_slice(data);
    pad(&mut out);
    out
}

/// Strip ISO/IEC 7816-4 padding
pub fn unpad(data: &[u8]) -> Result<&[u8], CipherError> {
    let end = data
        .iter()
        .rposition(|&b| b != 0x00)
        .ok_or(CipherError::InvalidPadding)?;
    if data[end] != 0x80 || data.len() - end > AES_BLOCK_LEN {
        return Err(CipherError::InvalidPadding);
    }
    Ok(&data[..end])
}

/// AES-128-CBC encryption of block aligned data in place
pub fn cbc_encrypt(
    key: &AesKey,
    iv: &[u8; AES_BLOCK_LEN],
    data: &mut [u8],
) -> Result<(), CipherError> {
    let len = data.len();
    if len % AES_BLOCK_LEN != 0 {
        return Err(CipherError::NotBlockAligned(len));
    }
    Encryptor::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| CipherError::NotBlockAligned(len))?;
    Ok(())
}

/// AES-128-CBC decryption of block aligned data in place
pub fn cbc_decrypt(
    key: &AesKey,
    iv: &[u8; AES_BLOCK_LEN],
    data: &mut [u8],
) -> Result<(), CipherError> {
    let len = data.len();
    if len % AES_BLOCK_LEN != 0 {
        return Err(CipherError::NotBlockAligned(len));
    }
    Decryptor::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| CipherError::NotBlockAligned(len))?;
    Ok(())
}

/// AES-128 encryption of a single block
pub fn ecb_encrypt_block(key: &AesKey, block: &[u8; AES_BLOCK_LEN]) -> [u8; AES_BLOCK_LEN] {
    let cipher = Aes128::new(key.into());
    let mut block = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut block);
    block.into()
}

/// AES-CMAC truncated to eight bytes
pub fn cmac8(key: &AesKey, data: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = <Cmac<Aes128> as Mac>::new(key.into());
    mac.update(data);
    let tag = mac.finalize().into_bytes();

    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&tag[..MAC_LEN]);
    out
}

/// Constant time comparison of a received MAC against a computed one
pub fn mac_matches(expected: &[u8; MAC_LEN], received: &[u8]) -> bool {
    expected[..].ct_eq(received).into()
}
