//! Raw file contents of EF.PD and EF.VD and their layout
//!
//! Both files carry gzip compressed XML. EF.PD starts with a two byte little
//! endian length. EF.VD starts with four big endian offsets: start and end of
//! the insurance data (VD), then start and end of the protected insurance
//! data (GVD). Offsets are inclusive and relative to the start of the file.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

/// Payload layout failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Fewer bytes than the header announces
    #[error("Payload truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// An offset pair of the EF.VD header is invalid
    #[error("Invalid offsets {start:#06X}..={end:#06X}")]
    InvalidOffsets {
        /// Start offset
        start: u16,
        /// End offset
        end: u16,
    },

    /// The payload is not valid gzip data
    #[error("Decompression failed: {0}")]
    Decompression(String),
}

/// Length of the EF.PD header
pub const PERSONAL_DATA_HEADER_LEN: usize = 2;

/// Compressed length announced by an EF.PD header
pub fn personal_data_length(header: &[u8]) -> Result<usize, PayloadError> {
    match header {
        [lo, hi, ..] => Ok(usize::from(u16::from_le_bytes([*lo, *hi]))),
        _ => Err(PayloadError::Truncated {
            expected: PERSONAL_DATA_HEADER_LEN,
            actual: header.len(),
        }),
    }
}

/// Offsets at the start of EF.VD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsuranceDataHeader {
    /// First byte of the insurance data
    pub start_vd: u16,
    /// Last byte of the insurance data
    pub end_vd: u16,
    /// First byte of the protected insurance data
    pub start_gvd: u16,
    /// Last byte of the protected insurance data
    pub end_gvd: u16,
}

impl InsuranceDataHeader {
    /// Header length
    pub const LEN: usize = 8;

    /// Decode and validate the header
    pub fn parse(header: &[u8]) -> Result<Self, PayloadError> {
        let Some(header) = header.get(..Self::LEN) else {
            return Err(PayloadError::Truncated {
                expected: Self::LEN,
                actual: header.len(),
            });
        };
        let word = |i: usize| u16::from_be_bytes([header[i], header[i + 1]]);
        let header = Self {
            start_vd: word(0),
            end_vd: word(2),
            start_gvd: word(4),
            end_gvd: word(6),
        };

        for (start, end) in [
            (header.start_vd, header.end_vd),
            (header.start_gvd, header.end_gvd),
        ] {
            if usize::from(start) < Self::LEN || end <= start {
                return Err(PayloadError::InvalidOffsets { start, end });
            }
        }
        Ok(header)
    }

    /// Bytes up to and including the end of the insurance data
    pub fn primary_length(&self) -> usize {
        usize::from(self.end_vd) + 1
    }

    /// Bytes up to and including the end of both payloads
    pub fn file_length(&self) -> usize {
        usize::from(self.end_vd.max(self.end_gvd)) + 1
    }
}

/// Contents of one file as read from the card, header included
#[derive(Clone, PartialEq, Eq)]
pub struct RawFilePayload(Bytes);

impl RawFilePayload {
    /// Wrap file contents
    pub const fn new(data: Bytes) -> Self {
        Self(data)
    }

    /// File contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the file was empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying buffer
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl std::fmt::Debug for RawFilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Personal data, only the size is printed
        write!(f, "RawFilePayload({} bytes)", self.0.len())
    }
}

/// Result of a successful card read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardData {
    /// EF.PD
    pub personal_data: RawFilePayload,
    /// EF.VD
    pub insurance_data: RawFilePayload,
}

/// Decompressed XML documents of a card
#[derive(Clone, PartialEq, Eq)]
pub struct CardDocuments {
    /// Personal data (PD)
    pub personal_data: Vec<u8>,
    /// Insurance data (VD)
    pub insurance_data: Vec<u8>,
    /// Protected insurance data (GVD), if it was read
    pub protected_insurance_data: Option<Vec<u8>>,
}

impl std::fmt::Debug for CardDocuments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDocuments")
            .field("personal_data", &self.personal_data.len())
            .field("insurance_data", &self.insurance_data.len())
            .field(
                "protected_insurance_data",
                &self.protected_insurance_data.as_ref().map(Vec::len),
            )
            .finish()
    }
}

impl CardData {
    /// Split both files and decompress every payload
    pub fn decompress(&self) -> crate::Result<CardDocuments> {
        let personal = PersonalDataFile::parse(&self.personal_data)?;
        let insurance = InsuranceDataFile::parse(&self.insurance_data)?;
        Ok(CardDocuments {
            personal_data: decompress(personal.compressed())?,
            insurance_data: decompress(insurance.primary())?,
            protected_insurance_data: insurance.secondary().map(decompress).transpose()?,
        })
    }
}

/// EF.PD split at its length prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalDataFile {
    compressed: Bytes,
}

impl PersonalDataFile {
    /// Validate the length prefix against the file
    pub fn parse(file: &RawFilePayload) -> Result<Self, PayloadError> {
        let len = personal_data_length(file.as_bytes())?;
        let end = PERSONAL_DATA_HEADER_LEN + len;
        if end > file.len() {
            return Err(PayloadError::Truncated {
                expected: end,
                actual: file.len(),
            });
        }
        Ok(Self {
            compressed: file.0.slice(PERSONAL_DATA_HEADER_LEN..end),
        })
    }

    /// Compressed personal data
    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }
}

/// EF.VD split at its offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceDataFile {
    header: InsuranceDataHeader,
    primary: Bytes,
    secondary: Option<Bytes>,
}

impl InsuranceDataFile {
    /// Validate the header and slice both payloads
    ///
    /// The secondary payload is `None` when the file ends before it, which
    /// is the case when only the primary payload was read.
    pub fn parse(file: &RawFilePayload) -> Result<Self, PayloadError> {
        let header = InsuranceDataHeader::parse(file.as_bytes())?;
        if header.primary_length() > file.len() {
            return Err(PayloadError::Truncated {
                expected: header.primary_length(),
                actual: file.len(),
            });
        }

        let primary = file
            .0
            .slice(usize::from(header.start_vd)..=usize::from(header.end_vd));
        let secondary = (usize::from(header.end_gvd) < file.len())
            .then(|| file.0.slice(usize::from(header.start_gvd)..=usize::from(header.end_gvd)));

        Ok(Self {
            header,
            primary,
            secondary,
        })
    }

    /// Offsets from the file header
    pub const fn header(&self) -> &InsuranceDataHeader {
        &self.header
    }

    /// Compressed insurance data (VD)
    pub fn primary(&self) -> &[u8] {
        &self.primary
    }

    /// Compressed protected insurance data (GVD)
    pub fn secondary(&self) -> Option<&[u8]> {
        self.secondary.as_deref()
    }
}

/// Inflate a gzip payload
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| PayloadError::Decompression(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn personal_data(xml: &[u8]) -> RawFilePayload {
        let compressed = gzip(xml);
        let mut file = (compressed.len() as u16).to_le_bytes().to_vec();
        file.extend_from_slice(&compressed);
        RawFilePayload::new(file.into())
    }

    fn insurance_data(vd: &[u8], gvd: &[u8]) -> Vec<u8> {
        let (vd, gvd) = (gzip(vd), gzip(gvd));
        let start_vd = 8u16;
        let end_vd = start_vd + vd.len() as u16 - 1;
        let start_gvd = end_vd + 1;
        let end_gvd = start_gvd + gvd.len() as u16 - 1;

        let mut file = Vec::new();
        for offset in [start_vd, end_vd, start_gvd, end_gvd] {
            file.extend_from_slice(&offset.to_be_bytes());
        }
        file.extend_from_slice(&vd);
        file.extend_from_slice(&gvd);
        file
    }

    #[test]
    fn test_personal_data_length_is_little_endian() {
        assert_eq!(personal_data_length(&[0x2A, 0x01]).unwrap(), 0x012A);
        assert_eq!(
            personal_data_length(&[0x2A]),
            Err(PayloadError::Truncated {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_personal_data_prefix_checked() {
        let file = RawFilePayload::new(Bytes::from_static(&[0x05, 0x00, 1, 2, 3]));
        assert_eq!(
            PersonalDataFile::parse(&file),
            Err(PayloadError::Truncated {
                expected: 7,
                actual: 5
            })
        );
    }

    #[test]
    fn test_insurance_header_validation() {
        let header = InsuranceDataHeader::parse(&[0, 8, 0, 99, 0, 100, 0, 149]).unwrap();
        assert_eq!(header.primary_length(), 100);
        assert_eq!(header.file_length(), 150);

        assert_eq!(
            InsuranceDataHeader::parse(&[0, 4, 0, 99, 0, 100, 0, 149]),
            Err(PayloadError::InvalidOffsets { start: 4, end: 99 })
        );
        assert_eq!(
            InsuranceDataHeader::parse(&[0, 8, 0, 99, 0, 100, 0, 100]),
            Err(PayloadError::InvalidOffsets {
                start: 100,
                end: 100
            })
        );
        assert!(matches!(
            InsuranceDataHeader::parse(&[0, 8, 0, 99]),
            Err(PayloadError::Truncated { .. })
        ));
    }

    #[test]
    fn test_secondary_absent_when_not_read() {
        let file = insurance_data(b"<vd/>", b"<gvd/>");
        let header = InsuranceDataHeader::parse(&file).unwrap();

        let full = InsuranceDataFile::parse(&RawFilePayload::new(file.clone().into())).unwrap();
        assert!(full.secondary().is_some());

        let primary_only =
            RawFilePayload::new(Bytes::copy_from_slice(&file[..header.primary_length()]));
        let parsed = InsuranceDataFile::parse(&primary_only).unwrap();
        assert!(parsed.secondary().is_none());
        assert_eq!(parsed.primary(), full.primary());
    }

    #[test]
    fn test_decompress_card_data() {
        let data = CardData {
            personal_data: personal_data(b"<pd>Erika</pd>"),
            insurance_data: RawFilePayload::new(insurance_data(b"<vd/>", b"<gvd/>").into()),
        };
        let documents = data.decompress().unwrap();
        assert_eq!(documents.personal_data, b"<pd>Erika</pd>");
        assert_eq!(documents.insurance_data, b"<vd/>");
        assert_eq!(documents.protected_insurance_data.as_deref(), Some(&b"<gvd/>"[..]));
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(matches!(
            decompress(&[1, 2, 3, 4]),
            Err(PayloadError::Decompression(_))
        ));
    }

    #[test]
    fn test_debug_hides_contents() {
        let file = RawFilePayload::new(Bytes::from_static(b"secret"));
        assert_eq!(format!("{file:?}"), "RawFilePayload(6 bytes)");
    }
}
