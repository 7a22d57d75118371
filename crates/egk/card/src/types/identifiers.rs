//! Identifiers of applications and files on the card

use std::fmt;

use bytes::Bytes;

use super::IdentifierError;

/// Application identifier (ISO/IEC 7816-4), 5 to 16 bytes
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApplicationIdentifier(Bytes);

impl ApplicationIdentifier {
    /// Shortest valid AID
    pub const MIN_LEN: usize = 5;
    /// Longest valid AID
    pub const MAX_LEN: usize = 16;

    /// Validate and wrap an AID
    pub fn new(aid: impl Into<Bytes>) -> Result<Self, IdentifierError> {
        let aid = aid.into();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&aid.len()) {
            return Err(IdentifierError::ApplicationIdentifierLength(aid.len()));
        }
        Ok(Self(aid))
    }

    /// Parse an AID from hex
    pub fn from_hex(aid: &str) -> Result<Self, IdentifierError> {
        let bytes = hex::decode(aid).map_err(|_| IdentifierError::InvalidHex)?;
        Self::new(bytes)
    }

    /// Wrap a well-known AID. Length is checked by the constant tests.
    pub(crate) const fn from_static(aid: &'static [u8]) -> Self {
        Self(Bytes::from_static(aid))
    }

    /// Raw AID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// AID as a cheaply clonable buffer
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl fmt::Debug for ApplicationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApplicationIdentifier({self})")
    }
}

impl fmt::Display for ApplicationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

/// File identifier, two bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{_0:04X}")]
pub struct FileIdentifier(u16);

impl FileIdentifier {
    /// Identifier reserved for the master file
    pub const MASTER_FILE: Self = Self(0x3F00);

    /// Validate a file identifier
    ///
    /// `3FFF` and `FFFF` are reserved, and `3F00` may only name the master file.
    pub const fn new(fid: u16) -> Result<Self, IdentifierError> {
        match fid {
            0x3FFF | 0xFFFF | 0x3F00 => Err(IdentifierError::ReservedFileIdentifier(fid)),
            _ => Ok(Self(fid)),
        }
    }

    pub(crate) const fn from_static(fid: u16) -> Self {
        Self(fid)
    }

    /// Numeric value
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Big endian encoding as sent in SELECT
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

/// Short file identifier, 1 to 30
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{_0:02X}")]
pub struct ShortFileIdentifier(u8);

impl ShortFileIdentifier {
    /// Smallest valid SFID
    pub const MIN: u8 = 1;
    /// Largest valid SFID
    pub const MAX: u8 = 30;

    /// Validate a short file identifier
    pub const fn new(sfid: u8) -> Result<Self, IdentifierError> {
        if sfid < Self::MIN || sfid > Self::MAX {
            return Err(IdentifierError::ShortFileIdentifierRange(sfid));
        }
        Ok(Self(sfid))
    }

    pub(crate) const fn from_static(sfid: u8) -> Self {
        Self(sfid)
    }

    /// Numeric value
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Location of an elementary file in the card file tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Application holding the file, `None` for files directly below the MF
    pub application: Option<ApplicationIdentifier>,
    /// File identifier
    pub fid: FileIdentifier,
    /// Short file identifier
    pub sfid: ShortFileIdentifier,
}

impl FileDescriptor {
    /// Describe a file inside an application
    pub const fn new(
        application: ApplicationIdentifier,
        fid: FileIdentifier,
        sfid: ShortFileIdentifier,
    ) -> Self {
        Self {
            application: Some(application),
            fid,
            sfid,
        }
    }

    /// Describe a file directly below the master file
    pub const fn in_master_file(fid: FileIdentifier, sfid: ShortFileIdentifier) -> Self {
        Self {
            application: None,
            fid,
            sfid,
        }
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.application {
            Some(aid) => write!(f, "{aid}/{}", self.fid),
            None => write!(f, "MF/{}", self.fid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_identifier_length() {
        assert!(ApplicationIdentifier::from_hex("D27600000102").is_ok());
        assert_eq!(
            ApplicationIdentifier::new(vec![0xD2, 0x76, 0x00, 0x00]),
            Err(IdentifierError::ApplicationIdentifierLength(4))
        );
        assert_eq!(
            ApplicationIdentifier::new(vec![0; 17]),
            Err(IdentifierError::ApplicationIdentifierLength(17))
        );
        assert_eq!(
            ApplicationIdentifier::from_hex("D2760G"),
            Err(IdentifierError::InvalidHex)
        );
    }

    #[test]
    fn test_file_identifier_reserved_values() {
        assert_eq!(FileIdentifier::new(0xD001).unwrap().to_bytes(), [0xD0, 0x01]);
        for fid in [0x3FFF, 0xFFFF, 0x3F00] {
            assert_eq!(
                FileIdentifier::new(fid),
                Err(IdentifierError::ReservedFileIdentifier(fid))
            );
        }
        assert_eq!(FileIdentifier::MASTER_FILE.value(), 0x3F00);
    }

    #[test]
    fn test_short_file_identifier_range() {
        assert!(ShortFileIdentifier::new(0).is_err());
        assert!(ShortFileIdentifier::new(1).is_ok());
        assert!(ShortFileIdentifier::new(30).is_ok());
        assert_eq!(
            ShortFileIdentifier::new(31),
            Err(IdentifierError::ShortFileIdentifierRange(31))
        );
    }

    #[test]
    fn test_display() {
        let aid = ApplicationIdentifier::from_hex("d27600000102").unwrap();
        let descriptor = FileDescriptor::new(
            aid,
            FileIdentifier::new(0xD002).unwrap(),
            ShortFileIdentifier::new(2).unwrap(),
        );
        assert_eq!(descriptor.to_string(), "D27600000102/D002");
    }
}
