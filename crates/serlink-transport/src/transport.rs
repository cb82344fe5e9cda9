use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::ring::{RingBuffer, WriteOutcome};
use crate::traits::{HardwareEvent, SerialDriver};

/// Default inbound buffer size in bytes.
pub const DEFAULT_RX_CAPACITY: usize = 64;

/// Default outbound buffer size in bytes.
pub const DEFAULT_TX_CAPACITY: usize = 64;

/// Buffer sizing for a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Inbound ring buffer size. Default: 64 bytes.
    pub rx_capacity: usize,
    /// Outbound ring buffer size. Default: 64 bytes.
    pub tx_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rx_capacity: DEFAULT_RX_CAPACITY,
            tx_capacity: DEFAULT_TX_CAPACITY,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rx_capacity == 0 || self.tx_capacity == 0 {
            return Err(TransportError::InvalidCapacity);
        }
        Ok(())
    }
}

/// Snapshot of the transport counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Bytes accepted by [`Transport::write`].
    pub bytes_queued: u64,
    /// Bytes handed to the hardware transmit slot.
    pub bytes_transmitted: u64,
    /// Bytes moved from the hardware into the inbound buffer.
    pub bytes_received: u64,
    /// Bytes handed to callers by [`Transport::read`].
    pub bytes_read: u64,
    /// Transmit-complete events skipped because main context held the outbound buffer.
    pub tx_events_deferred: u64,
    /// Receive-data events skipped because main context held the inbound buffer.
    pub rx_events_deferred: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    transmitted: AtomicU64,
    received: AtomicU64,
    read: AtomicU64,
    tx_deferred: AtomicU64,
    rx_deferred: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransportStats {
        TransportStats {
            bytes_queued: self.queued.load(Ordering::Relaxed),
            bytes_transmitted: self.transmitted.load(Ordering::Relaxed),
            bytes_received: self.received.load(Ordering::Relaxed),
            bytes_read: self.read.load(Ordering::Relaxed),
            tx_events_deferred: self.tx_deferred.load(Ordering::Relaxed),
            rx_events_deferred: self.rx_deferred.load(Ordering::Relaxed),
        }
    }
}

/// Duplex byte channel over a UART.
///
/// Two ring buffers sit between callers and the hardware: `rx` is filled by
/// the receive-data handler and drained by [`read`](Self::read); `tx` is
/// filled by [`write`](Self::write) and drained by the transmit-complete
/// handler.
///
/// Each buffer lives in its own critical section. Main-context operations
/// enter it for one buffer operation at a time. The handlers only *try* to
/// enter: if main context is inside, the handler returns immediately and the
/// main-context operation finishes the drain on its way out. This keeps the
/// handlers non-blocking while guaranteeing that at most one side touches a
/// buffer at any instant.
///
/// A `Transport` is meant to be shared (`Arc<Transport<_>>`) between the code
/// that reads and writes it and whatever delivers hardware events: an
/// interrupt shim, a dedicated thread, or a test harness.
pub struct Transport<D> {
    driver: D,
    rx: Mutex<RingBuffer>,
    tx: Mutex<RingBuffer>,
    counters: Counters,
    config: TransportConfig,
}

impl<D: SerialDriver> Transport<D> {
    /// Build a transport around `driver`. Call [`init`](Self::init) before use.
    pub fn new(driver: D, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            driver,
            rx: Mutex::new(RingBuffer::new(config.rx_capacity)?),
            tx: Mutex::new(RingBuffer::new(config.tx_capacity)?),
            counters: Counters::default(),
            config,
        })
    }

    /// Empty both buffers and enable the line.
    pub fn init(&self) {
        lock(&self.rx).clear();
        lock(&self.tx).clear();
        self.driver.enable();
        debug!(
            rx_capacity = self.config.rx_capacity,
            tx_capacity = self.config.tx_capacity,
            "serial transport initialized"
        );
    }

    /// Disable the line. Buffered bytes stay where they are.
    pub fn shutdown(&self) {
        self.driver.disable();
        debug!("serial transport disabled");
    }

    /// Queue `data` for transmission.
    ///
    /// Spins while the outbound buffer is full. Returns once every byte is
    /// queued, not once every byte is on the wire. Before returning, the
    /// hardware transmit slot is topped up from the buffer so that an idle
    /// transmitter starts sending; the transmit-complete handler carries on
    /// from there.
    pub fn write(&self, data: &[u8]) {
        for &byte in data {
            loop {
                let mut tx = lock(&self.tx);
                if tx.write(byte) == WriteOutcome::Stored {
                    break;
                }
                // Full: make room ourselves in case the transmitter is idle.
                self.drain_tx(&mut tx);
                drop(tx);
                std::hint::spin_loop();
            }
        }
        Counters::bump(&self.counters.queued, data.len() as u64);

        let mut tx = lock(&self.tx);
        self.drain_tx(&mut tx);
    }

    /// Move up to `buf.len()` received bytes into `buf`, oldest first.
    ///
    /// Callers check [`readable`](Self::readable) first; if fewer bytes are
    /// buffered than requested, only those are copied and the count is
    /// returned. Afterwards any bytes waiting in the hardware are pulled into
    /// the inbound buffer, covering a receive event that was skipped while
    /// this call held the buffer.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in buf.iter_mut() {
            let mut rx = lock(&self.rx);
            match rx.read() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Counters::bump(&self.counters.read, count as u64);

        let mut rx = lock(&self.rx);
        self.fill_rx(&mut rx);
        count
    }

    /// Number of received bytes waiting in the inbound buffer.
    pub fn readable(&self) -> usize {
        lock(&self.rx).occupied()
    }

    /// Free space in the outbound buffer.
    pub fn writeable(&self) -> usize {
        lock(&self.tx).free()
    }

    /// Transmit-complete handler.
    pub fn on_transmit_complete(&self) {
        match try_lock(&self.tx) {
            Some(mut tx) => self.drain_tx(&mut tx),
            None => Counters::bump(&self.counters.tx_deferred, 1),
        }
        self.driver.clear_tx_pending();
    }

    /// Receive-data handler.
    pub fn on_receive_data(&self) {
        match try_lock(&self.rx) {
            Some(mut rx) => self.fill_rx(&mut rx),
            None => Counters::bump(&self.counters.rx_deferred, 1),
        }
        self.driver.clear_rx_pending();
    }

    /// Dispatch a hardware event to its handler.
    pub fn on_event(&self, event: HardwareEvent) {
        match event {
            HardwareEvent::TransmitComplete => self.on_transmit_complete(),
            HardwareEvent::ReceiveData => self.on_receive_data(),
        }
    }

    pub fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Borrow the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn drain_tx(&self, tx: &mut RingBuffer) {
        let mut sent = 0u64;
        while !self.driver.is_tx_full() {
            let Some(byte) = tx.read() else { break };
            self.driver.write_tx(byte);
            sent += 1;
        }
        Counters::bump(&self.counters.transmitted, sent);
    }

    fn fill_rx(&self, rx: &mut RingBuffer) {
        let mut received = 0u64;
        while !rx.is_full() && self.driver.is_rx_available() {
            let _ = rx.write(self.driver.read_rx());
            received += 1;
        }
        Counters::bump(&self.counters.received, received);
    }
}

impl<D> std::fmt::Debug for Transport<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

// A panic while a buffer was held cannot leave it structurally broken, so a
// poisoned lock is simply reclaimed.
fn lock(buffer: &Mutex<RingBuffer>) -> MutexGuard<'_, RingBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn try_lock(buffer: &Mutex<RingBuffer>) -> Option<MutexGuard<'_, RingBuffer>> {
    match buffer.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
