use crate::error::{Result, TransportError};

/// Element width of every buffer on a byte-oriented link.
pub const BYTE_WIDTH_BITS: u8 = 8;

/// Occupancy of a [`RingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    Empty,
    Partial,
    Full,
}

/// Result of offering a byte to a [`RingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The byte was queued.
    Stored,
    /// The buffer was full; the byte was discarded and the contents are unchanged.
    Dropped,
}

/// Fixed-capacity FIFO byte queue.
///
/// A plain sequential queue: it carries no synchronization of its own. The
/// [`Transport`](crate::Transport) wraps each buffer in its own critical
/// section so that main context and the hardware-event handlers never touch
/// it at the same time.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Box<[u8]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl RingBuffer {
    /// Create an empty buffer holding `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_width(capacity, BYTE_WIDTH_BITS)
    }

    /// Create an empty buffer with an explicit element width.
    ///
    /// Only 8-bit elements exist on this link; other widths are rejected.
    pub fn with_width(capacity: usize, width_bits: u8) -> Result<Self> {
        if width_bits != BYTE_WIDTH_BITS {
            return Err(TransportError::UnsupportedWidth { bits: width_bits });
        }
        if capacity == 0 {
            return Err(TransportError::InvalidCapacity);
        }
        Ok(Self {
            slots: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    /// Queue one byte, or drop it when the buffer is full.
    pub fn write(&mut self, byte: u8) -> WriteOutcome {
        if self.len == self.slots.len() {
            return WriteOutcome::Dropped;
        }
        self.slots[self.head] = byte;
        self.head = (self.head + 1) % self.slots.len();
        self.len += 1;
        WriteOutcome::Stored
    }

    /// Dequeue the oldest byte.
    ///
    /// Returns `None` on an empty buffer without touching any state. Callers
    /// are expected to check [`occupied`](Self::occupied) first.
    pub fn read(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.slots[self.tail];
        self.tail = (self.tail + 1) % self.slots.len();
        self.len -= 1;
        Some(byte)
    }

    /// Empty, full, or somewhere in between.
    pub fn status(&self) -> BufferStatus {
        if self.len == 0 {
            BufferStatus::Empty
        } else if self.len == self.slots.len() {
            BufferStatus::Full
        } else {
            BufferStatus::Partial
        }
    }

    /// Number of queued bytes.
    pub fn occupied(&self) -> usize {
        self.len
    }

    /// Number of bytes that can still be queued.
    pub fn free(&self) -> usize {
        self.slots.len() - self.len
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether no byte is queued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next [`write`](Self::write) would drop its byte.
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Discard every queued byte and rewind both indices.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty() {
        let buf = RingBuffer::new(8).unwrap();
        assert_eq!(buf.status(), BufferStatus::Empty);
        assert_eq!(buf.occupied(), 0);
        assert_eq!(buf.free(), 8);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert_eq!(
            RingBuffer::new(0).unwrap_err(),
            TransportError::InvalidCapacity
        );
    }

    #[test]
    fn rejects_non_byte_width() {
        let err = RingBuffer::with_width(8, 16).unwrap_err();
        assert_eq!(err, TransportError::UnsupportedWidth { bits: 16 });
    }

    #[test]
    fn fifo_order() {
        let mut buf = RingBuffer::new(4).unwrap();
        for b in [10, 20, 30] {
            assert_eq!(buf.write(b), WriteOutcome::Stored);
        }
        assert_eq!(buf.status(), BufferStatus::Partial);
        assert_eq!(buf.read(), Some(10));
        assert_eq!(buf.read(), Some(20));
        assert_eq!(buf.read(), Some(30));
        assert_eq!(buf.read(), None);
    }

    #[test]
    fn full_buffer_drops_without_corrupting() {
        let mut buf = RingBuffer::new(3).unwrap();
        for b in [1, 2, 3] {
            assert_eq!(buf.write(b), WriteOutcome::Stored);
        }
        assert_eq!(buf.status(), BufferStatus::Full);
        assert!(buf.is_full());
        assert_eq!(buf.free(), 0);
        assert_eq!(buf.capacity(), 3);

        assert_eq!(buf.write(99), WriteOutcome::Dropped);
        assert_eq!(buf.occupied(), 3);

        assert_eq!(buf.read(), Some(1));
        assert_eq!(buf.status(), BufferStatus::Partial);
        assert!(!buf.is_full() && !buf.is_empty());
        assert_eq!(buf.write(4), WriteOutcome::Stored);

        let drained: Vec<u8> = std::iter::from_fn(|| buf.read()).collect();
        assert_eq!(drained, vec![2, 3, 4]);
    }

    #[test]
    fn single_slot_buffer_toggles_between_empty_and_full() {
        let mut buf = RingBuffer::new(1).unwrap();
        assert_eq!(buf.write(7), WriteOutcome::Stored);
        assert_eq!(buf.status(), BufferStatus::Full);
        assert_eq!(buf.write(8), WriteOutcome::Dropped);
        assert_eq!(buf.read(), Some(7));
        assert_eq!(buf.status(), BufferStatus::Empty);
        assert_eq!(buf.write(8), WriteOutcome::Stored);
        assert_eq!(buf.read(), Some(8));
    }

    #[test]
    fn indices_wrap_around() {
        let mut buf = RingBuffer::new(4).unwrap();
        for round in 0..10u8 {
            assert_eq!(buf.write(round), WriteOutcome::Stored);
            assert_eq!(buf.write(round.wrapping_add(100)), WriteOutcome::Stored);
            assert_eq!(buf.read(), Some(round));
            assert_eq!(buf.read(), Some(round.wrapping_add(100)));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn read_on_empty_leaves_state_untouched() {
        let mut buf = RingBuffer::new(2).unwrap();
        assert_eq!(buf.read(), None);
        assert_eq!(buf.write(5), WriteOutcome::Stored);
        assert_eq!(buf.read(), Some(5));
        assert_eq!(buf.read(), None);
        assert_eq!(buf.free(), 2);
    }

    #[test]
    fn clear_resets() {
        let mut buf = RingBuffer::new(4).unwrap();
        let _ = buf.write(1);
        let _ = buf.write(2);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.free(), 4);
    }
}
