use tracing::{debug, trace};

use crate::channel::Channel;
use crate::checksum::Fletcher16;
use crate::wire::{escape, END, START};

/// An open outbound frame.
///
/// Created by [`FrameCodec::start_encode`](crate::FrameCodec::start_encode),
/// which has already put the start marker on the channel. Payload bytes are
/// stuffed and forwarded as they are pushed; nothing is buffered. The frame
/// is closed by [`finish`](Self::finish). Dropping the encoder without
/// finishing abandons the frame: no end marker is sent and the receiver
/// discards the partial frame when the next start marker arrives.
#[must_use = "a frame is only terminated by calling `finish`"]
pub struct FrameEncoder<'a, C: Channel> {
    channel: &'a C,
    checksum: Fletcher16,
    payload_len: usize,
    finished: bool,
}

impl<'a, C: Channel> FrameEncoder<'a, C> {
    pub(crate) fn start(channel: &'a C) -> Self {
        channel.write(&[START]);
        Self {
            channel,
            checksum: Fletcher16::new(),
            payload_len: 0,
            finished: false,
        }
    }

    /// Add one payload byte to the frame.
    pub fn push(&mut self, byte: u8) {
        self.checksum.update(byte);
        self.payload_len += 1;
        self.put(byte);
    }

    pub fn push_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Payload bytes pushed so far.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Send the checksum and the end marker.
    pub fn finish(mut self) {
        let (sum1, sum2) = self.checksum.sums();
        self.put(sum1);
        self.put(sum2);
        self.channel.write(&[END]);
        self.finished = true;
        trace!(len = self.payload_len, sum1, sum2, "frame encoded");
    }

    fn put(&self, byte: u8) {
        let mut stuffed = [0u8; 2];
        self.channel.write(escape(byte, &mut stuffed));
    }
}

impl<C: Channel> Drop for FrameEncoder<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(len = self.payload_len, "frame abandoned before end marker");
        }
    }
}

impl<C: Channel> std::fmt::Debug for FrameEncoder<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameEncoder")
            .field("checksum", &self.checksum)
            .field("payload_len", &self.payload_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::MemoryChannel;
    use crate::wire::ESC;
    use crate::FrameCodec;

    use super::*;

    #[test]
    fn start_marker_is_written_immediately() {
        let mut codec = FrameCodec::new(MemoryChannel::new());
        let encoder = codec.start_encode();
        assert_eq!(encoder.payload_len(), 0);
        encoder.finish();
        assert_eq!(codec.channel().drain(), vec![START, 0x00, 0x00, END]);
    }

    #[test]
    fn encodes_scenario_frame() {
        let mut codec = FrameCodec::new(MemoryChannel::new());
        let mut encoder = codec.start_encode();
        encoder.push_slice(&[0x01, 0x02, 0xF7]);
        encoder.finish();
        assert_eq!(
            codec.channel().drain(),
            vec![START, 0x01, 0x02, ESC, 0xD7, 0xFA, 0xFE, END]
        );
    }

    #[test]
    fn checksum_bytes_are_escaped() {
        // sum1 = 0xF6 (ESC), sum2 = 0xF6.
        let mut codec = FrameCodec::new(MemoryChannel::new());
        let mut encoder = codec.start_encode();
        encoder.push(ESC);
        encoder.finish();
        assert_eq!(
            codec.channel().drain(),
            vec![START, ESC, 0xD6, ESC, 0xD6, ESC, 0xD6, END]
        );
    }

    #[test]
    fn sums_reset_between_frames() {
        let mut codec = FrameCodec::new(MemoryChannel::new());
        for _ in 0..2 {
            let mut encoder = codec.start_encode();
            encoder.push_slice(&[1, 2, 3, 4, 5]);
            encoder.finish();
        }
        let wire = codec.channel().drain();
        let frame = [START, 1, 2, 3, 4, 5, 0x0F, 0x23, END];
        assert_eq!(&wire[..9], &frame);
        assert_eq!(&wire[9..], &frame);
    }

    #[test]
    fn abandoned_frame_has_no_end_marker() {
        let mut codec = FrameCodec::new(MemoryChannel::new());
        {
            let mut encoder = codec.start_encode();
            encoder.push(0x42);
        }
        assert_eq!(codec.channel().drain(), vec![START, 0x42]);
    }
}
