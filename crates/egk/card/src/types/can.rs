//! Card access number

use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::IdentifierError;

/// The six digit card access number printed on the card
///
/// The digits are wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CardAccessNumber(String);

impl CardAccessNumber {
    /// Number of digits
    pub const LEN: usize = 6;

    /// Validate a card access number
    pub fn new(can: &str) -> Result<Self, IdentifierError> {
        if can.len() != Self::LEN || !can.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentifierError::InvalidCardAccessNumber);
        }
        Ok(Self(can.to_owned()))
    }

    /// ASCII digits, the PACE password
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for CardAccessNumber {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for CardAccessNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardAccessNumber(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(CardAccessNumber::new("123456").is_ok());
        for bad in ["12345", "1234567", "12345a", "", "１２３４５６"] {
            assert_eq!(
                CardAccessNumber::new(bad),
                Err(IdentifierError::InvalidCardAccessNumber),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let can: CardAccessNumber = "123456".parse().unwrap();
        assert!(!format!("{can:?}").contains("123456"));
        assert_eq!(can.as_bytes(), b"123456");
    }
}
