//! APDU command definitions and traits
//!
//! This module provides types and traits for working with APDU commands
//! according to ISO/IEC 7816-4 §5.1, covering short and extended length
//! encodings of all seven command cases.

mod error;

pub use error::CommandError;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use derive_more::Display;

use crate::response::Response;
use crate::response::table::StatusTable;

/// Expected response length (Ne) of a command
///
/// Values range over `[0, 65536]`. `256` and `65536` are the wildcards for
/// "as much as the card will return" in short and extended encoding.
pub type ExpectedLength = u32;

/// Largest body that fits a short encoding
pub const MAX_SHORT_DATA: usize = 255;
/// Largest body that fits an extended encoding
pub const MAX_EXTENDED_DATA: usize = 65_535;
/// Short encoding wildcard, transmitted as `00`
pub const SHORT_WILDCARD: ExpectedLength = 256;
/// Extended encoding wildcard, transmitted as `00 00`
pub const EXTENDED_WILDCARD: ExpectedLength = 65_536;

/// The seven command cases of ISO/IEC 7816-3
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCase {
    /// Header only
    #[display("case 1")]
    Case1,
    /// Header and short Le
    #[display("case 2S")]
    Case2Short,
    /// Header and extended Le
    #[display("case 2E")]
    Case2Extended,
    /// Header, short Lc and body
    #[display("case 3S")]
    Case3Short,
    /// Header, extended Lc and body
    #[display("case 3E")]
    Case3Extended,
    /// Header, short Lc, body and short Le
    #[display("case 4S")]
    Case4Short,
    /// Header, extended Lc, body and extended Le
    #[display("case 4E")]
    Case4Extended,
}

impl CommandCase {
    /// Whether the case uses extended length fields
    pub const fn is_extended(self) -> bool {
        matches!(
            self,
            Self::Case2Extended | Self::Case3Extended | Self::Case4Extended
        )
    }

    /// Serialized length of a command in this case with `data_len` body bytes
    pub const fn encoded_len(self, data_len: usize) -> usize {
        4 + match self {
            Self::Case1 => 0,
            Self::Case2Short => 1,
            Self::Case2Extended => 3,
            Self::Case3Short => 1 + data_len,
            Self::Case3Extended => 3 + data_len,
            Self::Case4Short => 2 + data_len,
            Self::Case4Extended => 5 + data_len,
        }
    }
}

/// Core trait for typed APDU commands
///
/// A typed command knows its header, body and expected length, and owns the
/// status table that gives its status words their command-local meaning.
pub trait ApduCommand {
    /// Command-local meaning of a status word
    type Status: Copy + PartialEq + fmt::Debug + 'static;

    /// Command class (CLA)
    fn class(&self) -> u8 {
        0x00
    }

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<Bytes> {
        None
    }

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    /// Status table for this command family
    fn status_table() -> &'static StatusTable<Self::Status>;

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        let mut command = Command::new(self.class(), self.instruction(), self.p1(), self.p2());
        if let Some(data) = self.data() {
            command = command.with_data(data);
        }
        if let Some(le) = self.expected_length() {
            command = command.with_le(le);
        }
        command
    }

    /// Resolve the command-local outcome of a response
    fn status_of(response: &Response) -> Self::Status {
        Self::status_table().lookup(response.status())
    }
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional, never empty when set through the builders)
    pub data: Option<Bytes>,
    /// Expected length Ne (optional, never zero when set through the builders)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Ne)
    pub fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self::new(cla, ins, p1, p2).with_le(le)
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Create a new command with both data and expected length
    pub fn new_with_data_and_le<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
        le: ExpectedLength,
    ) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data).with_le(le)
    }

    /// Set the data field. An empty body is the same as no body.
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        let data = data.into();
        self.data = (!data.is_empty()).then_some(data);
        self
    }

    /// Set the expected length field. `0` means no response data is expected.
    pub fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = (le != 0).then_some(le);
        self
    }

    /// Replace the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Body bytes, empty when the command carries none
    pub fn body(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Expected length with `0` normalised to absent
    pub fn ne(&self) -> Option<ExpectedLength> {
        self.le.filter(|&le| le != 0)
    }

    /// Determine the command case, validating the length invariants
    pub fn case(&self) -> Result<CommandCase, CommandError> {
        let data_len = self.body().len();
        if data_len > MAX_EXTENDED_DATA {
            return Err(CommandError::CommandBodyTooLarge(data_len));
        }

        let ne = match self.ne() {
            Some(le) if le > EXTENDED_WILDCARD => {
                return Err(CommandError::ExpectedLengthOutOfBounds(le));
            }
            ne => ne,
        };

        let extended = data_len > MAX_SHORT_DATA || ne.is_some_and(|le| le > SHORT_WILDCARD);

        Ok(match (data_len, ne, extended) {
            (0, None, _) => CommandCase::Case1,
            (0, Some(_), false) => CommandCase::Case2Short,
            (0, Some(_), true) => CommandCase::Case2Extended,
            (_, None, false) => CommandCase::Case3Short,
            (_, None, true) => CommandCase::Case3Extended,
            (_, Some(_), false) => CommandCase::Case4Short,
            (_, Some(_), true) => CommandCase::Case4Extended,
        })
    }

    /// Whether encoding this command requires extended length fields
    pub fn is_extended(&self) -> Result<bool, CommandError> {
        self.case().map(CommandCase::is_extended)
    }

    /// Serialize the command
    pub fn to_bytes(&self) -> Result<Bytes, CommandError> {
        let case = self.case()?;
        let data = self.body();
        let ne = self.ne().unwrap_or_default();

        let mut buffer = BytesMut::with_capacity(case.encoded_len(data.len()));

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        match case {
            CommandCase::Case1 => {}
            CommandCase::Case2Short => buffer.put_u8(short_le(ne)),
            CommandCase::Case2Extended => {
                buffer.put_u8(0x00);
                buffer.put_u16(extended_le(ne));
            }
            CommandCase::Case3Short => {
                buffer.put_u8(data.len() as u8);
                buffer.put_slice(data);
            }
            CommandCase::Case3Extended => {
                buffer.put_u8(0x00);
                buffer.put_u16(data.len() as u16);
                buffer.put_slice(data);
            }
            CommandCase::Case4Short => {
                buffer.put_u8(data.len() as u8);
                buffer.put_slice(data);
                buffer.put_u8(short_le(ne));
            }
            CommandCase::Case4Extended => {
                buffer.put_u8(0x00);
                buffer.put_u16(data.len() as u16);
                buffer.put_slice(data);
                buffer.put_u16(extended_le(ne));
            }
        }

        Ok(buffer.freeze())
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, CommandError> {
        let [cla, ins, p1, p2, body @ ..] = data else {
            return Err(CommandError::InvalidLength(data.len()));
        };
        let command = Self::new(*cla, *ins, *p1, *p2);

        match body {
            // Case 1
            [] => Ok(command),
            // Case 2S
            [le] => Ok(command.with_le(decode_short_le(*le))),
            // Extended cases start with a zero byte followed by two length bytes
            [0x00, hi, lo, rest @ ..] => {
                let length = u16::from_be_bytes([*hi, *lo]);
                match rest {
                    // Case 2E
                    [] => Ok(command.with_le(decode_extended_le(length))),
                    _ => {
                        let lc = length as usize;
                        if lc == 0 {
                            return Err(CommandError::InvalidLength(data.len()));
                        }
                        match rest.len() {
                            // Case 3E
                            n if n == lc => Ok(command.with_data(Bytes::copy_from_slice(rest))),
                            // Case 4E
                            n if n == lc + 2 => {
                                let le = u16::from_be_bytes([rest[lc], rest[lc + 1]]);
                                Ok(command
                                    .with_data(Bytes::copy_from_slice(&rest[..lc]))
                                    .with_le(decode_extended_le(le)))
                            }
                            _ => Err(CommandError::InvalidLength(data.len())),
                        }
                    }
                }
            }
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                match rest.len() {
                    // Case 3S
                    n if n == lc => Ok(command.with_data(Bytes::copy_from_slice(rest))),
                    // Case 4S
                    n if n == lc + 1 => Ok(command
                        .with_data(Bytes::copy_from_slice(&rest[..lc]))
                        .with_le(decode_short_le(rest[lc]))),
                    _ => Err(CommandError::InvalidLength(data.len())),
                }
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:02X} {:02X} {:02X}",
            self.cla, self.ins, self.p1, self.p2
        )?;
        if let Some(data) = &self.data {
            write!(f, " Lc={}", data.len())?;
        }
        if let Some(le) = self.le {
            write!(f, " Ne={le}")?;
        }
        Ok(())
    }
}

const fn short_le(ne: ExpectedLength) -> u8 {
    if ne == SHORT_WILDCARD { 0x00 } else { ne as u8 }
}

const fn extended_le(ne: ExpectedLength) -> u16 {
    if ne == EXTENDED_WILDCARD {
        0x0000
    } else {
        ne as u16
    }
}

const fn decode_short_le(le: u8) -> ExpectedLength {
    if le == 0 {
        SHORT_WILDCARD
    } else {
        le as ExpectedLength
    }
}

const fn decode_extended_le(le: u16) -> ExpectedLength {
    if le == 0 {
        EXTENDED_WILDCARD
    } else {
        le as ExpectedLength
    }
}
