//! Status words (SW1 SW2)

use std::fmt;

use tracing::Level;

/// Status word trailing every response APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// SW1
    pub sw1: u8,
    /// SW2
    pub sw2: u8,
}

/// Coarse ISO/IEC 7816-4 classification of a status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// `90 00` or `61 XX`
    Normal,
    /// `62 XX` and `63 XX`, the command completed
    Warning,
    /// Everything else
    Error,
}

impl StatusWord {
    /// Status word from its two bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Status word from `SW1 << 8 | SW2`
    pub const fn from_u16(value: u16) -> Self {
        let [sw1, sw2] = value.to_be_bytes();
        Self { sw1, sw2 }
    }

    /// `SW1 << 8 | SW2`
    pub const fn to_u16(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Wire form
    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.sw1, self.sw2]
    }

    /// `90 00`
    pub const fn is_success(&self) -> bool {
        self.to_u16() == 0x9000
    }

    /// Classify by SW1
    pub const fn class(&self) -> StatusClass {
        match self.sw1 {
            0x90 | 0x61 => StatusClass::Normal,
            0x62 | 0x63 => StatusClass::Warning,
            _ => StatusClass::Error,
        }
    }

    /// Level at which a channel logs this status
    pub const fn tracing_level(&self) -> Level {
        match self.class() {
            StatusClass::Normal => Level::DEBUG,
            StatusClass::Warning => Level::INFO,
            StatusClass::Error => Level::WARN,
        }
    }

    /// Human readable meaning, for logs
    pub const fn description(&self) -> &'static str {
        match self.to_u16() {
            0x9000 => "Success",
            0x6282 => "End of file reached before reading Ne bytes",
            0x6283 => "Selected file deactivated",
            0x6300 => "Authentication failed",
            0x6581 => "Memory failure",
            0x6700 => "Wrong length",
            0x6881 => "Logical channel not supported",
            0x6882 => "Secure messaging not supported",
            0x6981 => "Command incompatible with file structure",
            0x6982 => "Security status not satisfied",
            0x6983 => "Authentication method blocked",
            0x6985 => "Conditions of use not satisfied",
            0x6986 => "Command not allowed, no current EF",
            0x6987 => "Expected secure messaging data objects missing",
            0x6988 => "Secure messaging data objects incorrect",
            0x6A80 => "Incorrect parameters in the data field",
            0x6A81 => "Function not supported",
            0x6A82 => "File not found",
            0x6A86 => "Incorrect parameters P1-P2",
            0x6A88 => "Referenced data not found",
            0x6B00 => "Offset outside the file",
            0x6D00 => "Instruction code not supported",
            0x6E00 => "Class not supported",
            _ => match self.sw1 {
                0x61 => "More data available",
                0x63 if self.sw2 & 0xF0 == 0xC0 => "Wrong secret, retry counter",
                0x6C => "Wrong Le field",
                _ => "Unknown status word",
            },
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

impl From<u16> for StatusWord {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Status words shared by every command
pub mod common {
    use super::StatusWord;

    /// `90 00`
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
    /// `62 82`, end of file before Ne bytes
    pub const END_OF_FILE: StatusWord = StatusWord::new(0x62, 0x82);
    /// `69 87`, secure messaging objects missing
    pub const SM_OBJECTS_MISSING: StatusWord = StatusWord::new(0x69, 0x87);
    /// `69 88`, secure messaging objects incorrect
    pub const SM_OBJECTS_INCORRECT: StatusWord = StatusWord::new(0x69, 0x88);
}
