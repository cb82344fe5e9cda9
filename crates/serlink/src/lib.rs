//! Framed messaging over an interrupt-driven serial link.
//!
//! serlink moves byte-stuffed, checksummed frames across a UART-style byte
//! channel. The transport layer buffers bytes between application code and
//! the hardware; the frame layer turns that byte stream into whole messages
//! and recovers from line noise on its own.
//!
//! # Crate Structure
//!
//! - [`transport`]: ring buffers, the interrupt-driven [`Transport`](transport::Transport)
//!   and a simulated UART/line for host-side use
//! - [`frame`]: the wire format and the polled [`FrameCodec`](frame::FrameCodec)

/// Re-export transport types.
pub mod transport {
    pub use serlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serlink_frame::*;
}
