//! Byte-stuffed message framing over a serial channel.
//!
//! Every message goes on the wire as:
//! - a start marker (`0xF7`)
//! - the payload, with reserved bytes escaped
//! - a Fletcher-16 checksum, low sum first, also escaped
//! - an end marker (`0x7F`)
//!
//! The decoder resynchronizes on the next start marker after any line noise,
//! so a corrupt or truncated frame costs only itself.

pub mod channel;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod reader;
pub mod wire;
pub mod writer;

pub use channel::{Channel, MemoryChannel};
pub use checksum::{fletcher16, Fletcher16};
pub use codec::{
    decode_frame, encode_frame, Frame, FrameCodec, FrameConfig, DEFAULT_BUFFER_CAPACITY,
};
pub use error::{FrameError, Result};
pub use reader::DecodeStats;
pub use wire::{encoded_len, max_encoded_len, END, ESC, ESC_XOR, START};
pub use writer::FrameEncoder;
