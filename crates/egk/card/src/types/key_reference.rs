//! References to keys and passwords stored on the card

use super::IdentifierError;

/// Marker bit of DF-specific references
const DF_SPECIFIC: u8 = 0x80;

/// Reference to a key or password object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyReference {
    /// Cryptographic key, 2 to 28
    CryptographicKey(u8),
    /// Password, 0 to 31
    Password(u8),
}

impl KeyReference {
    /// Validate a cryptographic key reference
    pub const fn cryptographic_key(id: u8) -> Result<Self, IdentifierError> {
        if id < 2 || id > 28 {
            return Err(IdentifierError::KeyReferenceRange(id));
        }
        Ok(Self::CryptographicKey(id))
    }

    /// Validate a password reference
    pub const fn password(id: u8) -> Result<Self, IdentifierError> {
        if id > 31 {
            return Err(IdentifierError::KeyReferenceRange(id));
        }
        Ok(Self::Password(id))
    }

    /// Reference number without the DF marker
    pub const fn id(self) -> u8 {
        match self {
            Self::CryptographicKey(id) | Self::Password(id) => id,
        }
    }

    /// Value for an object stored in the master file
    pub const fn global(self) -> u8 {
        self.id()
    }

    /// Value for an object stored in the selected DF
    pub const fn df_specific(self) -> u8 {
        self.id() | DF_SPECIFIC
    }

    /// Encoded reference
    pub const fn encode(self, df_specific: bool) -> u8 {
        if df_specific {
            self.df_specific()
        } else {
            self.global()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(KeyReference::cryptographic_key(1).is_err());
        assert!(KeyReference::cryptographic_key(2).is_ok());
        assert!(KeyReference::cryptographic_key(28).is_ok());
        assert_eq!(
            KeyReference::cryptographic_key(29),
            Err(IdentifierError::KeyReferenceRange(29))
        );
        assert!(KeyReference::password(0).is_ok());
        assert!(KeyReference::password(31).is_ok());
        assert!(KeyReference::password(32).is_err());
    }

    #[test]
    fn test_df_specific_marker() {
        let can = KeyReference::password(2).unwrap();
        assert_eq!(can.encode(false), 0x02);
        assert_eq!(can.encode(true), 0x82);
        assert_eq!(can.id(), 2);
    }
}
