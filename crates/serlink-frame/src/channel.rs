//! The byte-channel capability the codec runs on.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serlink_transport::{SerialDriver, Transport};

/// A non-blocking duplex byte channel.
///
/// [`Transport`] is the production implementation; [`MemoryChannel`] stands
/// in for it in tests and offline tooling. Receivers take `&self` because a
/// channel is typically shared with whatever feeds it.
pub trait Channel {
    /// Bytes that can be read right now.
    fn readable(&self) -> usize;

    /// Bytes that can be written without waiting.
    fn writeable(&self) -> usize;

    /// Read up to `buf.len()` bytes. Returns how many were read.
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Write every byte of `data`, waiting for room if the channel requires it.
    fn write(&self, data: &[u8]);
}

impl<D: SerialDriver> Channel for Transport<D> {
    fn readable(&self) -> usize {
        Transport::readable(self)
    }

    fn writeable(&self) -> usize {
        Transport::writeable(self)
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        Transport::read(self, buf)
    }

    fn write(&self, data: &[u8]) {
        Transport::write(self, data)
    }
}

impl<C: Channel + ?Sized> Channel for &C {
    fn readable(&self) -> usize {
        (**self).readable()
    }

    fn writeable(&self) -> usize {
        (**self).writeable()
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn write(&self, data: &[u8]) {
        (**self).write(data)
    }
}

impl<C: Channel + ?Sized> Channel for Arc<C> {
    fn readable(&self) -> usize {
        (**self).readable()
    }

    fn writeable(&self) -> usize {
        (**self).writeable()
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn write(&self, data: &[u8]) {
        (**self).write(data)
    }
}

/// In-memory byte pipe: whatever is written becomes readable.
///
/// Optionally bounded; writes beyond the bound are dropped, like a full
/// receive buffer on a real line.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    bytes: Mutex<VecDeque<u8>>,
    limit: Option<usize>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(limit: usize) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::with_capacity(limit)),
            limit: Some(limit),
        }
    }

    /// Make `data` readable, as if it had arrived from the line.
    pub fn feed(&self, data: &[u8]) {
        Channel::write(self, data)
    }

    /// Take everything currently buffered.
    pub fn drain(&self) -> Vec<u8> {
        self.bytes().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    fn bytes(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Channel for MemoryChannel {
    fn readable(&self) -> usize {
        self.bytes().len()
    }

    fn writeable(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.bytes().len()),
            None => usize::MAX,
        }
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        let mut bytes = self.bytes();
        let n = buf.len().min(bytes.len());
        for (slot, byte) in buf.iter_mut().zip(bytes.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&self, data: &[u8]) {
        let mut bytes = self.bytes();
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(bytes.len()),
            None => data.len(),
        };
        bytes.extend(data.iter().take(room));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serlink_transport::{SimulatedUart, TransportConfig};

    #[test]
    fn memory_channel_is_fifo() {
        let channel = MemoryChannel::new();
        channel.feed(&[1, 2, 3]);
        assert_eq!(channel.readable(), 3);

        let mut buf = [0u8; 2];
        assert_eq!(channel.read(&mut buf), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(channel.drain(), vec![3]);
        assert!(channel.is_empty());
    }

    #[test]
    fn bounded_memory_channel_drops_overflow() {
        let channel = MemoryChannel::bounded(2);
        channel.write(&[1, 2, 3]);
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.writeable(), 0);
        assert_eq!(channel.drain(), vec![1, 2]);
    }

    #[test]
    fn transport_is_a_channel() {
        fn readable_of<C: Channel>(channel: &C) -> usize {
            channel.readable()
        }

        let transport = Transport::new(SimulatedUart::new(), TransportConfig::default()).unwrap();
        transport.init();
        transport.driver().inject_rx(&[1, 2]);
        transport.on_receive_data();

        assert_eq!(readable_of(&transport), 2);
        assert_eq!(readable_of(&Arc::new(&transport)), 2);
        assert_eq!(Channel::writeable(&transport), TransportConfig::default().tx_capacity);
    }
}
