//! Cryptographic building blocks of PACE and secure messaging
//!
//! - [`kdf`] derives AES-128 keys from shared secrets and the CAN
//! - [`ec`] implements brainpoolP256r1 arithmetic and the generic mapping
//! - [`symmetric`] wraps AES-CBC, AES-ECB, AES-CMAC and ISO/IEC 7816-4 padding

pub mod symmetric;
pub mod ec;
pub mod kdf;

/// AES-128 key length
pub const AES_KEY_LEN: usize = 16;
/// AES block length
pub const AES_BLOCK_LEN: usize = 16;
/// Length of a truncated CMAC
pub const MAC_LEN: usize = 8;

/// AES-128 key
pub type AesKey = [u8; AES_KEY_LEN];
