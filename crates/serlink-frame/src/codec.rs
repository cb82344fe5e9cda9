use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::channel::Channel;
use crate::checksum::Fletcher16;
use crate::error::{FrameError, Result};
use crate::reader::{verify, DecodeStats, FrameReader};
use crate::wire::{escape, max_encoded_len, unstuff, END, MAX_OVERHEAD, START};
use crate::writer::FrameEncoder;

/// Default receive buffer size: 512 bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The verified payload, checksum removed.
    pub payload: Bytes,
}

impl Frame {
    /// Wrap an already verified payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Size of the receive accumulation buffer. Default: 512 bytes.
    pub buffer_capacity: usize,
    /// Largest payload [`FrameCodec::send`] accepts. Default: the largest
    /// payload that always fits the receive buffer, even fully escaped.
    pub max_payload_size: usize,
}

impl FrameConfig {
    /// Configuration whose buffer holds any frame of up to `max_payload_size` bytes.
    pub fn for_payload(max_payload_size: usize) -> Self {
        Self {
            buffer_capacity: max_encoded_len(max_payload_size),
            max_payload_size,
        }
    }

    /// Largest payload guaranteed to fit a buffer of `buffer_capacity` bytes.
    pub fn max_payload_for(buffer_capacity: usize) -> usize {
        buffer_capacity.saturating_sub(MAX_OVERHEAD) / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity < MAX_OVERHEAD {
            return Err(FrameError::InvalidConfig(format!(
                "buffer capacity {} is below the {MAX_OVERHEAD}-byte frame overhead",
                self.buffer_capacity
            )));
        }
        let limit = Self::max_payload_for(self.buffer_capacity);
        if self.max_payload_size > limit {
            return Err(FrameError::InvalidConfig(format!(
                "max payload {} does not fit a {}-byte buffer (limit {limit})",
                self.max_payload_size, self.buffer_capacity
            )));
        }
        Ok(())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_payload_size: Self::max_payload_for(DEFAULT_BUFFER_CAPACITY),
        }
    }
}

/// Stateful frame encoder/decoder over a [`Channel`].
///
/// Encoding streams straight to the channel; see [`start_encode`](Self::start_encode).
/// Decoding is polled with [`pull`](Self::pull), which never blocks: each call
/// drains what the channel has, and returns at most one frame. Bytes that
/// arrive after a frame are kept for the next call.
///
/// A codec is driven from a single context; it has no internal locking.
pub struct FrameCodec<C> {
    channel: C,
    reader: FrameReader,
    config: FrameConfig,
}

impl<C: Channel> FrameCodec<C> {
    /// Create a codec with default configuration.
    pub fn new(channel: C) -> Self {
        let config = FrameConfig::default();
        Self {
            channel,
            reader: FrameReader::new(config.buffer_capacity),
            config,
        }
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(channel: C, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channel,
            reader: FrameReader::new(config.buffer_capacity),
            config,
        })
    }

    /// Open a frame: the start marker goes out now, the checksum restarts.
    pub fn start_encode(&mut self) -> FrameEncoder<'_, C> {
        FrameEncoder::start(&self.channel)
    }

    /// Encode `payload` as one complete frame.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        let mut encoder = self.start_encode();
        encoder.push_slice(payload);
        encoder.finish();
        Ok(())
    }

    /// Poll for the next frame.
    ///
    /// - `Ok(Some(frame))`: a frame arrived and its checksum matched.
    /// - `Ok(None)`: no complete frame is buffered yet.
    /// - `Err(_)`: a frame (or a runaway frame prefix) was discarded. The
    ///   codec has already resynchronized and stays usable.
    ///
    /// Only as many bytes as the receive buffer has room for are taken from
    /// the channel; the rest stay queued there for the next call.
    pub fn pull(&mut self) -> Result<Option<Frame>> {
        let want = self.channel.readable().min(self.reader.free());
        if want > 0 {
            let n = self.channel.read(self.reader.spare_mut(want));
            self.reader.commit(n);
        }
        Ok(self.reader.next_frame()?.map(Frame::new))
    }

    /// Poll for the next frame, copying its payload into `out`.
    ///
    /// Returns the payload length. Zero covers every case where no payload is
    /// delivered: nothing complete yet, a discarded frame, an empty frame, or
    /// a payload longer than `out`. Use [`pull`](Self::pull) to tell them apart.
    pub fn pull_into(&mut self, out: &mut [u8]) -> usize {
        match self.pull() {
            Ok(Some(frame)) if frame.len() <= out.len() => {
                out[..frame.len()].copy_from_slice(&frame.payload);
                frame.len()
            }
            Ok(Some(frame)) => {
                warn!(
                    len = frame.len(),
                    capacity = out.len(),
                    "frame does not fit output buffer, dropping"
                );
                0
            }
            Ok(None) | Err(_) => 0,
        }
    }

    /// Discard any partially received bytes.
    pub fn reset(&mut self) {
        self.reader.clear();
    }

    /// Bytes currently held in the receive buffer.
    pub fn buffered(&self) -> usize {
        self.reader.buffered()
    }

    pub fn stats(&self) -> DecodeStats {
        self.reader.stats()
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Borrow the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Consume the codec and return the channel.
    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl<C> std::fmt::Debug for FrameCodec<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec")
            .field("config", &self.config)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

/// Encode `payload` as one complete frame into `dst`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    let mut checksum = Fletcher16::new();
    checksum.update_slice(payload);
    let (sum1, sum2) = checksum.sums();

    dst.reserve(max_encoded_len(payload.len()));
    dst.put_u8(START);
    let mut stuffed = [0u8; 2];
    for &byte in payload.iter().chain([sum1, sum2].iter()) {
        dst.put_slice(escape(byte, &mut stuffed));
    }
    dst.put_u8(END);
}

/// Decode the first complete frame in `wire`.
///
/// Bytes before the start marker are ignored. Returns
/// [`FrameError::Incomplete`] if no start/end pair is present.
pub fn decode_frame(wire: &[u8]) -> Result<Frame> {
    let start = wire
        .iter()
        .position(|&b| b == START)
        .ok_or(FrameError::Incomplete)?;
    let end = wire[start..]
        .iter()
        .position(|&b| b == END)
        .map(|pos| pos + start)
        .ok_or(FrameError::Incomplete)?;
    let start = wire[..end]
        .iter()
        .rposition(|&b| b == START)
        .unwrap_or(start);

    let payload = verify(unstuff(&wire[start + 1..end])?)?;
    Ok(Frame::new(payload))
}
