/// Errors that can occur during frame encoding/decoding.
///
/// Every decode error is recoverable: the offending bytes have already been
/// discarded and the next call picks up at the following start marker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The checksum carried by the frame does not match its payload.
    #[error("checksum mismatch (computed {computed:#06x}, received {received:#06x})")]
    ChecksumMismatch { computed: u16, received: u16 },

    /// The bytes between the delimiters do not form a frame.
    #[error("malformed frame: {reason}")]
    Malformed { reason: &'static str },

    /// The receive buffer filled up before an end marker arrived.
    #[error("frame exceeds receive buffer ({discarded} bytes discarded)")]
    Oversized { discarded: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The input does not contain a complete frame.
    #[error("incomplete frame (missing start or end marker)")]
    Incomplete,

    /// A codec was configured with inconsistent limits.
    #[error("invalid frame configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
