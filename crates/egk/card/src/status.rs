//! Command-local meaning of status words
//!
//! Every command family owns a [`StatusTable`]. The same status word can
//! resolve to different outcomes: `62 82` is an end-of-file warning for READ
//! BINARY but unknown for SELECT.

use derive_more::Display;
use egk_apdu_core::{StatusEntry, StatusTable};

/// Semantic outcome of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ResponseStatus {
    /// Command completed
    #[display("success")]
    Success,
    /// Fewer bytes than requested, the end of the file was reached
    #[display("end of file reached")]
    EndOfFileWarning,
    /// Selected file is deactivated
    #[display("file deactivated")]
    FileDeactivated,
    /// Wrong password, retries remain
    #[display("wrong secret, retries remain")]
    WrongSecretWarning,
    /// Authentication failed
    #[display("authentication failure")]
    AuthenticationFailure,
    /// Password is blocked
    #[display("password blocked")]
    PasswordBlocked,
    /// Access conditions not fulfilled
    #[display("security status not satisfied")]
    SecurityStatusNotSatisfied,
    /// Expected secure messaging data objects are missing
    #[display("secure messaging data objects missing")]
    SecureMessagingObjectsMissing,
    /// Secure messaging data objects are incorrect
    #[display("secure messaging data objects incorrect")]
    SecureMessagingObjectsIncorrect,
    /// Command not allowed for the file structure
    #[display("wrong file type")]
    WrongFileType,
    /// No elementary file selected
    #[display("no current EF")]
    NoCurrentEf,
    /// File or application not found
    #[display("file not found")]
    FileNotFound,
    /// Referenced key or password not found
    #[display("key not found")]
    KeyNotFound,
    /// Unsupported algorithm or key reference in the security environment
    #[display("unsupported function")]
    UnsupportedFunction,
    /// Offset beyond the end of the file
    #[display("offset too big")]
    OffsetTooBig,
    /// Lc or Le inconsistent with the command
    #[display("wrong length")]
    WrongLength,
    /// Memory failure while processing
    #[display("memory failure")]
    MemoryFailure,
    /// Status word has no meaning for this command
    #[display("unknown status")]
    UnknownStatus,
}

impl ResponseStatus {
    /// Whether the outcome lets the caller continue
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

use ResponseStatus::*;

const SELECT_ENTRIES: &[StatusEntry<ResponseStatus>] = &[
    StatusEntry::exact(0x9000, Success),
    StatusEntry::exact(0x6283, FileDeactivated),
    StatusEntry::exact(0x6A82, FileNotFound),
    StatusEntry::exact(0x6982, SecurityStatusNotSatisfied),
    StatusEntry::exact(0x6987, SecureMessagingObjectsMissing),
    StatusEntry::exact(0x6988, SecureMessagingObjectsIncorrect),
    StatusEntry::exact(0x6700, WrongLength),
];

const READ_BINARY_ENTRIES: &[StatusEntry<ResponseStatus>] = &[
    StatusEntry::exact(0x9000, Success),
    StatusEntry::exact(0x6282, EndOfFileWarning),
    StatusEntry::exact(0x6281, MemoryFailure),
    StatusEntry::exact(0x6981, WrongFileType),
    StatusEntry::exact(0x6986, NoCurrentEf),
    StatusEntry::exact(0x6A82, FileNotFound),
    StatusEntry::exact(0x6B00, OffsetTooBig),
    StatusEntry::exact(0x6982, SecurityStatusNotSatisfied),
    StatusEntry::exact(0x6987, SecureMessagingObjectsMissing),
    StatusEntry::exact(0x6988, SecureMessagingObjectsIncorrect),
    StatusEntry::exact(0x6700, WrongLength),
];

const MANAGE_SECURITY_ENVIRONMENT_ENTRIES: &[StatusEntry<ResponseStatus>] = &[
    StatusEntry::exact(0x9000, Success),
    StatusEntry::exact(0x6A81, UnsupportedFunction),
    StatusEntry::exact(0x6A88, KeyNotFound),
    StatusEntry::exact(0x6700, WrongLength),
];

const GENERAL_AUTHENTICATE_ENTRIES: &[StatusEntry<ResponseStatus>] = &[
    StatusEntry::exact(0x9000, Success),
    StatusEntry::exact(0x6300, AuthenticationFailure),
    StatusEntry::masked(0x63C0, 0xFFF0, WrongSecretWarning),
    StatusEntry::exact(0x6983, PasswordBlocked),
    StatusEntry::exact(0x6982, SecurityStatusNotSatisfied),
    StatusEntry::exact(0x6A80, AuthenticationFailure),
    StatusEntry::exact(0x6A88, KeyNotFound),
    StatusEntry::exact(0x6700, WrongLength),
];

/// SELECT by AID or FID
pub static SELECT: StatusTable<ResponseStatus> = StatusTable::new(SELECT_ENTRIES, UnknownStatus);

/// READ BINARY
pub static READ_BINARY: StatusTable<ResponseStatus> =
    StatusTable::new(READ_BINARY_ENTRIES, UnknownStatus);

/// MANAGE SECURITY ENVIRONMENT
pub static MANAGE_SECURITY_ENVIRONMENT: StatusTable<ResponseStatus> =
    StatusTable::new(MANAGE_SECURITY_ENVIRONMENT_ENTRIES, UnknownStatus);

/// GENERAL AUTHENTICATE
pub static GENERAL_AUTHENTICATE: StatusTable<ResponseStatus> =
    StatusTable::new(GENERAL_AUTHENTICATE_ENTRIES, UnknownStatus);
