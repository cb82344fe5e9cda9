use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::checksum::fletcher16;
use crate::error::{FrameError, Result};
use crate::wire::{unstuff, END, START};

/// Counters kept by the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Frames that passed the checksum.
    pub frames: u64,
    /// Frames discarded for a checksum mismatch.
    pub checksum_failures: u64,
    /// Frames discarded as structurally invalid.
    pub malformed: u64,
    /// Frame prefixes discarded because they outgrew the receive buffer.
    pub oversized: u64,
    /// Frames cut short by a new start marker before their end marker.
    pub truncated: u64,
    /// Bytes thrown away while looking for a start marker.
    pub garbage_bytes: u64,
}

/// Fixed-capacity accumulation buffer for inbound frames.
///
/// Holds, from offset 0, either nothing, garbage waiting to be skipped, or
/// the prefix of a frame in progress. Bytes after a completed frame are kept
/// and become the start of the next one.
#[derive(Debug)]
pub(crate) struct FrameReader {
    buf: Box<[u8]>,
    filled: usize,
    stats: DecodeStats,
}

impl FrameReader {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            filled: 0,
            stats: DecodeStats::default(),
        }
    }

    /// Unused tail of the buffer, at most `max` bytes long.
    pub(crate) fn spare_mut(&mut self, max: usize) -> &mut [u8] {
        let end = self.buf.len().min(self.filled.saturating_add(max));
        &mut self.buf[self.filled..end]
    }

    /// Mark `n` bytes of [`spare_mut`](Self::spare_mut) as filled.
    pub(crate) fn commit(&mut self, n: usize) {
        self.filled = (self.filled + n).min(self.buf.len());
    }

    pub(crate) fn free(&self) -> usize {
        self.buf.len() - self.filled
    }

    pub(crate) fn buffered(&self) -> usize {
        self.filled
    }

    pub(crate) fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub(crate) fn clear(&mut self) {
        self.filled = 0;
    }

    /// Extract the next complete frame from the buffered bytes.
    ///
    /// `Ok(None)` means no complete frame is buffered yet. Errors report a
    /// frame that was found and discarded; either way the consumed bytes are
    /// gone and the buffer starts at the next start marker, if any.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if !self.skip_to_start() {
            return Ok(None);
        }

        let Some(end) = self.find(END, 1) else {
            return self.handle_unterminated();
        };

        // A second start marker before the end means the first frame lost
        // its end marker; only the newest one can still be whole.
        let start = self.buf[..end]
            .iter()
            .rposition(|&b| b == START)
            .unwrap_or(0);
        if start > 0 {
            self.stats.truncated += 1;
            debug!(dropped = start, "discarding frame without end marker");
        }

        let result = self.check(start + 1, end);
        self.retire(end);
        match &result {
            Ok(payload) => {
                self.stats.frames += 1;
                trace!(len = payload.len(), "frame decoded");
            }
            Err(FrameError::ChecksumMismatch { computed, received }) => {
                self.stats.checksum_failures += 1;
                warn!(computed, received, "discarding frame with bad checksum");
            }
            Err(err) => {
                self.stats.malformed += 1;
                warn!(error = %err, "discarding malformed frame");
            }
        }
        result.map(Some)
    }

    /// Drop everything before the first start marker. Returns whether one is buffered.
    fn skip_to_start(&mut self) -> bool {
        match self.find(START, 0) {
            Some(0) => true,
            Some(pos) => {
                self.discard_front(pos);
                true
            }
            None => {
                let garbage = self.filled;
                self.discard_front(garbage);
                false
            }
        }
    }

    fn handle_unterminated(&mut self) -> Result<Option<Bytes>> {
        if self.filled < self.buf.len() {
            return Ok(None);
        }

        // Full with no end marker: keep the newest frame prefix if there is one.
        match self.buf[..self.filled].iter().rposition(|&b| b == START) {
            Some(pos) if pos > 0 => {
                self.stats.truncated += 1;
                debug!(dropped = pos, "discarding frame without end marker");
                self.shift_down(pos);
                Ok(None)
            }
            _ => {
                let discarded = self.filled;
                self.filled = 0;
                self.stats.oversized += 1;
                warn!(discarded, "receive buffer full without end marker, resynchronizing");
                Err(FrameError::Oversized { discarded })
            }
        }
    }

    /// Unstuff and verify the body in `buf[from..to]`.
    fn check(&self, from: usize, to: usize) -> Result<Bytes> {
        verify(unstuff(&self.buf[from..to])?)
    }

    /// Retire everything up to and including the end marker at `end`.
    fn retire(&mut self, end: usize) {
        let consumed = end + 1;
        match self.find(START, consumed) {
            Some(next) => {
                self.stats.garbage_bytes += (next - consumed) as u64;
                self.shift_down(next);
            }
            None => {
                self.stats.garbage_bytes += (self.filled - consumed) as u64;
                self.filled = 0;
            }
        }
    }

    fn discard_front(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.stats.garbage_bytes += n as u64;
        debug!(skipped = n, "resynchronizing on start marker");
        self.shift_down(n);
    }

    fn shift_down(&mut self, from: usize) {
        self.buf.copy_within(from..self.filled, 0);
        self.filled -= from;
    }

    fn find(&self, marker: u8, from: usize) -> Option<usize> {
        self.buf[from.min(self.filled)..self.filled]
            .iter()
            .position(|&b| b == marker)
            .map(|pos| pos + from)
    }
}

/// Split the checksum pair off an unstuffed body and verify it.
pub(crate) fn verify(mut body: Vec<u8>) -> Result<Bytes> {
    if body.len() < 2 {
        return Err(FrameError::Malformed {
            reason: "frame shorter than its checksum",
        });
    }
    let payload_len = body.len() - 2;
    let received = u16::from_le_bytes([body[payload_len], body[payload_len + 1]]);
    body.truncate(payload_len);

    let computed = fletcher16(&body);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }
    Ok(Bytes::from(body))
}
