//! Key derivation for PACE and secure messaging

use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use super::{AES_KEY_LEN, AesKey};

/// Purpose of a derived key, the 32-bit counter appended to the secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum KeyPurpose {
    /// Session encryption key
    Encryption = 1,
    /// Session MAC key
    Mac = 2,
    /// Key that decrypts the PACE nonce, derived from the password
    Password = 3,
}

/// `SHA-1(secret || counter)` truncated to an AES-128 key
pub fn derive_key(secret: &[u8], purpose: KeyPurpose) -> Zeroizing<AesKey> {
    let mut hasher = Sha1::new();
    hasher.update(secret);
    hasher.update((purpose as u32).to_be_bytes());
    let digest = hasher.finalize();

    let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
    key.copy_from_slice(&digest[..AES_KEY_LEN]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_counter_is_appended_big_endian() {
        let mut input = b"123456".to_vec();
        input.extend_from_slice(&[0, 0, 0, 3]);
        let digest = Sha1::digest(&input);
        assert_eq!(
            derive_key(b"123456", KeyPurpose::Password).as_slice(),
            &digest[..16]
        );
    }

    #[test]
    fn test_purposes_give_distinct_keys() {
        let secret = hex!("28768D20701247DAE81804C9E780EDE582A9996DB4A315020B2733197DB84925");
        let enc = derive_key(&secret, KeyPurpose::Encryption);
        let mac = derive_key(&secret, KeyPurpose::Mac);
        assert_ne!(*enc, *mac);
        assert_eq!(enc.len(), 16);
    }
}
