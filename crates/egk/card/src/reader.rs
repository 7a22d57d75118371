//! SELECT and READ BINARY sequences for whole elementary files

use std::fmt;

use bytes::{Bytes, BytesMut};
use egk_apdu_core::command::{EXTENDED_WILDCARD, ExpectedLength, SHORT_WILDCARD};
use egk_apdu_core::{ApduCommand, CardChannel, Response, StatusWord};
use tracing::{debug, instrument, trace};

use crate::commands::{ReadBinaryCommand, SelectCommand};
use crate::constants::{EF_PD, EF_VD};
use crate::payload::{
    InsuranceDataHeader, PERSONAL_DATA_HEADER_LEN, PayloadError, RawFilePayload,
    personal_data_length,
};
use crate::status::ResponseStatus;
use crate::types::{ApplicationIdentifier, FileDescriptor, FileIdentifier};

/// File access failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The channel failed, including secure messaging and cancellation
    #[error(transparent)]
    Channel(#[from] egk_apdu_core::Error),

    /// SELECT was rejected
    #[error("SELECT failed with status {status} ({outcome})")]
    SelectFailed {
        /// Raw status word
        status: StatusWord,
        /// Meaning for SELECT
        outcome: ResponseStatus,
    },

    /// READ BINARY returned a status other than success or end of file
    #[error("READ BINARY failed with status {status} ({outcome})")]
    UnexpectedResponseStatus {
        /// Raw status word
        status: StatusWord,
        /// Meaning for READ BINARY
        outcome: ResponseStatus,
    },

    /// READ BINARY succeeded without returning data
    #[error("No data received")]
    NoDataReceived,

    /// The next offset cannot be addressed by READ BINARY
    #[error("Offset {0} out of range")]
    OffsetOutOfRange(usize),

    /// The file header is invalid
    #[error(transparent)]
    Header(#[from] PayloadError),
}

/// Reads complete files through any channel, protected or not
pub struct FileReader<'c, C: CardChannel> {
    channel: &'c mut C,
    selected: Option<ApplicationIdentifier>,
}

impl<C: CardChannel> fmt::Debug for FileReader<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl<'c, C: CardChannel> FileReader<'c, C> {
    /// Reader over `channel`
    pub fn new(channel: &'c mut C) -> Self {
        Self {
            channel,
            selected: None,
        }
    }

    /// SELECT an application by AID
    pub fn select_application(&mut self, aid: &ApplicationIdentifier) -> Result<(), ReadError> {
        self.select(&SelectCommand::application(aid.clone()))?;
        debug!(aid = %aid, "Application selected");
        self.selected = Some(aid.clone());
        Ok(())
    }

    /// SELECT an elementary file by FID inside the current application
    pub fn select_file(&mut self, fid: FileIdentifier) -> Result<(), ReadError> {
        self.select(&SelectCommand::file(fid))?;
        debug!(fid = %fid, "File selected");
        Ok(())
    }

    fn select(&mut self, command: &SelectCommand) -> Result<(), ReadError> {
        let response = self.channel.transmit(&command.to_command())?;
        let outcome = SelectCommand::status_of(&response);
        if outcome.is_success() {
            Ok(())
        } else {
            Err(ReadError::SelectFailed {
                status: response.status(),
                outcome,
            })
        }
    }

    fn enter_application(&mut self, file: &FileDescriptor) -> Result<(), ReadError> {
        match &file.application {
            Some(aid) if self.selected.as_ref() != Some(aid) => self.select_application(aid),
            _ => Ok(()),
        }
    }

    /// Read a file until the card reports its end
    #[instrument(level = "debug", skip_all, fields(file = %file))]
    pub fn read_to_end(&mut self, file: &FileDescriptor) -> Result<RawFilePayload, ReadError> {
        self.enter_application(file)?;
        let length = self.chunk_length(None);
        let (mut data, end) = self.read_first(file, length)?;
        if !end {
            self.read_continuation(&mut data, None)?;
        }
        debug!(len = data.len(), "File read");
        Ok(RawFilePayload::new(data.freeze()))
    }

    /// Read a file whose size is announced by a header
    ///
    /// The header is read first by SFID; `total_length` turns it into the
    /// file size, header included. The rest is read by offset.
    pub fn read_sized<F>(
        &mut self,
        file: &FileDescriptor,
        header_len: usize,
        total_length: F,
    ) -> Result<RawFilePayload, ReadError>
    where
        F: FnOnce(&[u8]) -> Result<usize, ReadError>,
    {
        self.enter_application(file)?;
        let (mut data, end) = self.read_first(file, header_len)?;
        if data.len() < header_len {
            return Err(PayloadError::Truncated {
                expected: header_len,
                actual: data.len(),
            }
            .into());
        }

        let total = total_length(&data[..header_len])?;
        debug!(file = %file, total, "File size from header");
        if !end {
            self.read_continuation(&mut data, Some(total))?;
        }
        data.truncate(total);
        debug!(file = %file, len = data.len(), "File read");
        Ok(RawFilePayload::new(data.freeze()))
    }

    /// Read EF.PD: two byte little endian length, then the compressed data
    pub fn read_personal_data(&mut self) -> Result<RawFilePayload, ReadError> {
        self.read_sized(&EF_PD, PERSONAL_DATA_HEADER_LEN, |header| {
            Ok(PERSONAL_DATA_HEADER_LEN + personal_data_length(header)?)
        })
    }

    /// Read EF.VD up to the end of the secondary payload, or only up to the
    /// primary payload when `read_secondary` is false
    pub fn read_insurance_data(
        &mut self,
        read_secondary: bool,
    ) -> Result<RawFilePayload, ReadError> {
        self.read_sized(&EF_VD, InsuranceDataHeader::LEN, |header| {
            let header = InsuranceDataHeader::parse(header)?;
            Ok(if read_secondary {
                header.file_length()
            } else {
                header.primary_length()
            })
        })
    }

    fn read_first(
        &mut self,
        file: &FileDescriptor,
        length: usize,
    ) -> Result<(BytesMut, bool), ReadError> {
        let command = ReadBinaryCommand::with_sfid(file.sfid, 0, length as ExpectedLength)
            .ok_or(ReadError::OffsetOutOfRange(0))?;
        let (chunk, end) = self.read_chunk(&command)?;
        Ok((BytesMut::from(chunk.as_ref()), end))
    }

    /// Offset reads until `total` bytes are present or the card signals the end
    fn read_continuation(
        &mut self,
        data: &mut BytesMut,
        total: Option<usize>,
    ) -> Result<(), ReadError> {
        while total.is_none_or(|total| data.len() < total) {
            let remaining = total.map(|total| total - data.len());
            let command = ReadBinaryCommand::at_offset(
                data.len(),
                self.chunk_length(remaining) as ExpectedLength,
            )
            .ok_or(ReadError::OffsetOutOfRange(data.len()))?;

            let (chunk, end) = self.read_chunk(&command)?;
            data.extend_from_slice(&chunk);
            if end {
                break;
            }
        }
        Ok(())
    }

    /// One READ BINARY. Returns the data and whether the end of file was reached.
    fn read_chunk(&mut self, command: &ReadBinaryCommand) -> Result<(Bytes, bool), ReadError> {
        let response = self.channel.transmit(&command.to_command())?;
        let outcome = ReadBinaryCommand::status_of(&response);
        trace!(address = ?command.address(), len = response.data().len(), %outcome, "Chunk read");

        match outcome {
            ResponseStatus::Success if response.data().is_empty() => Err(ReadError::NoDataReceived),
            ResponseStatus::Success => Ok((payload(response), false)),
            ResponseStatus::EndOfFileWarning => Ok((payload(response), true)),
            outcome => Err(ReadError::UnexpectedResponseStatus {
                status: response.status(),
                outcome,
            }),
        }
    }

    /// Bytes to request in one READ BINARY
    fn chunk_length(&self, remaining: Option<usize>) -> usize {
        let mut length = self
            .channel
            .max_transceive_length()
            .saturating_sub(2)
            .min(remaining.unwrap_or(EXTENDED_WILDCARD as usize));
        if !self.channel.supports_extended_length() {
            length = length.min(SHORT_WILDCARD as usize);
        }
        length.max(1)
    }
}

fn payload(response: Response) -> Bytes {
    response.payload().cloned().unwrap_or_default()
}
