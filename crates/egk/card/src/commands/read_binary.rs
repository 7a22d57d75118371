//! READ BINARY

use egk_apdu_core::{ApduCommand, ExpectedLength, StatusTable};

use crate::status::{self, ResponseStatus};
use crate::types::ShortFileIdentifier;

/// Instruction byte of READ BINARY
pub const INS_READ_BINARY: u8 = 0xB0;

/// Largest offset reachable in short file identifier addressing
pub const MAX_SFID_OFFSET: usize = 0xFF;
/// Largest offset reachable in P1-P2 addressing
pub const MAX_OFFSET: usize = 0x7FFF;

const P1_SFID_FLAG: u8 = 0x80;

/// How a READ BINARY addresses its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAddress {
    /// Implicitly select the EF by SFID, offset in P2
    ShortFileIdentifier {
        /// File to read
        sfid: ShortFileIdentifier,
        /// Offset 0..=255
        offset: u8,
    },
    /// Read the current EF, offset in P1-P2
    Offset(u16),
}

/// READ BINARY of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBinaryCommand {
    address: ReadAddress,
    length: ExpectedLength,
}

impl ReadBinaryCommand {
    /// Read `length` bytes at `offset` of the file named by `sfid`
    ///
    /// Returns `None` when the offset does not fit into P2.
    pub fn with_sfid(
        sfid: ShortFileIdentifier,
        offset: usize,
        length: ExpectedLength,
    ) -> Option<Self> {
        let offset = u8::try_from(offset).ok()?;
        Some(Self {
            address: ReadAddress::ShortFileIdentifier { sfid, offset },
            length,
        })
    }

    /// Read `length` bytes at `offset` of the current EF
    ///
    /// Returns `None` when the offset exceeds 15 bits.
    pub fn at_offset(offset: usize, length: ExpectedLength) -> Option<Self> {
        if offset > MAX_OFFSET {
            return None;
        }
        Some(Self {
            address: ReadAddress::Offset(offset as u16),
            length,
        })
    }

    /// Addressing mode of this command
    pub const fn address(&self) -> ReadAddress {
        self.address
    }
}

impl ApduCommand for ReadBinaryCommand {
    type Status = ResponseStatus;

    fn instruction(&self) -> u8 {
        INS_READ_BINARY
    }

    fn p1(&self) -> u8 {
        match self.address {
            ReadAddress::ShortFileIdentifier { sfid, .. } => P1_SFID_FLAG | sfid.value(),
            ReadAddress::Offset(offset) => (offset >> 8) as u8,
        }
    }

    fn p2(&self) -> u8 {
        match self.address {
            ReadAddress::ShortFileIdentifier { offset, .. } => offset,
            ReadAddress::Offset(offset) => offset as u8,
        }
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(self.length)
    }

    fn status_table() -> &'static StatusTable<ResponseStatus> {
        &status::READ_BINARY
    }
}
