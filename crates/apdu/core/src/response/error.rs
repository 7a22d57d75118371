//! Response decoding errors

/// A response APDU could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// Fewer than the two status bytes were received
    #[error("Insufficient response data: {0} bytes (need at least 2)")]
    InsufficientResponseData(usize),
}
