/// Errors that can occur while setting up a serial transport.
///
/// Runtime faults on the link (overruns, dropped bytes) are not errors: they
/// are absorbed silently and show up only in the transport statistics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// A ring buffer was requested with zero slots.
    #[error("ring buffer capacity must be at least 1 slot")]
    InvalidCapacity,

    /// A ring buffer element width other than 8 bits was requested.
    #[error("unsupported ring buffer element width ({bits} bits, only 8 is supported)")]
    UnsupportedWidth { bits: u8 },
}

pub type Result<T> = std::result::Result<T, TransportError>;
