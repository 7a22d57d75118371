//! Response APDUs
//!
//! A response is an optional body followed by the two status bytes SW1 SW2.
//! An empty body is stored as `None` so that "no data" has one representation.

pub mod error;
pub mod status;
pub mod table;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use error::ResponseError;
use status::StatusWord;

/// Decoded response APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    body: Option<Bytes>,
    status: StatusWord,
}

impl Response {
    /// Response with an optional body, empty bodies are dropped
    pub fn new(body: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self { body: body.filter(|b| !b.is_empty()), status: status.into() }
    }

    /// `90 00` response
    pub fn success(body: Option<Bytes>) -> Self {
        Self::new(body, status::common::SUCCESS)
    }

    /// Status-only response
    pub fn error(status: impl Into<StatusWord>) -> Self {
        Self { body: None, status: status.into() }
    }

    /// Decode `body || SW1 || SW2`
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ResponseError> {
        let (body, status) = split_trailer(raw)?;
        trace!(status = %status, body_len = body.len(), "Decoded response");
        Ok(Self::new(Some(Bytes::copy_from_slice(body)), status))
    }

    /// Response body, `None` when the card returned no data
    pub const fn payload(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Response body as a slice, empty when absent
    pub fn data(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the status word is `90 00`
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Encode as `body || SW1 || SW2`
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.data().len() + 2);
        out.put_slice(self.data());
        out.put_slice(&self.status.to_bytes());
        out.freeze()
    }
}

/// Split off the trailing status word
fn split_trailer(raw: &[u8]) -> Result<(&[u8], StatusWord), ResponseError> {
    match raw {
        [body @ .., sw1, sw2] => Ok((body, StatusWord::new(*sw1, *sw2))),
        _ => Err(ResponseError::InsufficientResponseData(raw.len())),
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = ResponseError;

    fn try_from(raw: &[u8]) -> Result<Self, ResponseError> {
        Self::from_bytes(raw)
    }
}

impl TryFrom<Bytes> for Response {
    type Error = ResponseError;

    fn try_from(raw: Bytes) -> Result<Self, ResponseError> {
        let (_, status) = split_trailer(&raw)?;
        let body = raw.slice(..raw.len() - 2);
        Ok(Self::new(Some(body), status))
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}
