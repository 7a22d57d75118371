//! SELECT

use bytes::Bytes;
use egk_apdu_core::{ApduCommand, StatusTable};

use crate::status::{self, ResponseStatus};
use crate::types::{ApplicationIdentifier, FileIdentifier};

/// Instruction byte of SELECT
pub const INS_SELECT: u8 = 0xA4;

/// P1: select a DF by application identifier
pub const P1_BY_AID: u8 = 0x04;
/// P1: select an EF below the current DF by file identifier
pub const P1_BY_FID: u8 = 0x02;
/// P2: return no file control information
pub const P2_NO_RESPONSE_DATA: u8 = 0x0C;

/// SELECT without response data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectCommand {
    /// Select an application
    Application(ApplicationIdentifier),
    /// Select an elementary file in the current application
    File(FileIdentifier),
}

impl SelectCommand {
    /// Select an application by AID
    pub const fn application(aid: ApplicationIdentifier) -> Self {
        Self::Application(aid)
    }

    /// Select an EF by FID
    pub const fn file(fid: FileIdentifier) -> Self {
        Self::File(fid)
    }
}

impl ApduCommand for SelectCommand {
    type Status = ResponseStatus;

    fn instruction(&self) -> u8 {
        INS_SELECT
    }

    fn p1(&self) -> u8 {
        match self {
            Self::Application(_) => P1_BY_AID,
            Self::File(_) => P1_BY_FID,
        }
    }

    fn p2(&self) -> u8 {
        P2_NO_RESPONSE_DATA
    }

    fn data(&self) -> Option<Bytes> {
        Some(match self {
            Self::Application(aid) => aid.to_bytes(),
            Self::File(fid) => Bytes::copy_from_slice(&fid.to_bytes()),
        })
    }

    fn status_table() -> &'static StatusTable<ResponseStatus> {
        &status::SELECT
    }
}
