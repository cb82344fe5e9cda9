use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, trace};

use crate::error::Result;
use crate::traits::{HardwareEvent, SerialDriver};
use crate::transport::{Transport, TransportConfig};
use crate::uart::SimulatedUart;

/// A transport running on a [`SimulatedUart`].
pub type SimulatedTransport = Transport<SimulatedUart>;

/// Deterministic bit flips applied to bytes crossing the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Noise {
    /// Corrupt every `every`-th byte (1-based count across both directions).
    pub every: u64,
    /// XOR mask applied to a corrupted byte.
    pub mask: u8,
}

/// Two simulated UARTs wired back to back.
///
/// Each [`step`](Self::step) plays one bit-time of the wire: one byte per
/// direction moves from a transmit FIFO to the opposite receive FIFO, and the
/// interrupt lines are sampled. Both interrupts are level-triggered: transmit
/// complete fires while the transmit FIFO has room, receive data fires while
/// the receive FIFO holds bytes. The handlers run on whatever thread calls
/// `step`, which is how the transports see asynchronous events.
pub struct SimulatedLine {
    a: Arc<SimulatedTransport>,
    b: Arc<SimulatedTransport>,
    noise: Option<Noise>,
    flow_control: bool,
    carried: u64,
    corrupted: u64,
}

impl SimulatedLine {
    pub fn new(a: Arc<SimulatedTransport>, b: Arc<SimulatedTransport>) -> Self {
        Self {
            a,
            b,
            noise: None,
            flow_control: false,
            carried: 0,
            corrupted: 0,
        }
    }

    /// Build two initialized transports and the line joining them.
    pub fn pair(
        config: TransportConfig,
    ) -> Result<(Arc<SimulatedTransport>, Arc<SimulatedTransport>, Self)> {
        let a = Arc::new(Transport::new(SimulatedUart::new(), config)?);
        let b = Arc::new(Transport::new(SimulatedUart::new(), config)?);
        a.init();
        b.init();
        let line = Self::new(Arc::clone(&a), Arc::clone(&b));
        Ok((a, b, line))
    }

    /// Corrupt bytes in flight. An `every` of zero disables the noise.
    pub fn with_noise(mut self, noise: Noise) -> Self {
        self.noise = (noise.every > 0).then_some(noise);
        self
    }

    /// Hold bytes in the sender's FIFO while the receiver's FIFO is full.
    ///
    /// Without it the line runs at a fixed rate and a receiver that falls
    /// behind loses bytes to overruns.
    pub fn with_flow_control(mut self, enabled: bool) -> Self {
        self.flow_control = enabled;
        self
    }

    /// Advance the line by one byte-time. Returns whether anything moved.
    pub fn step(&mut self) -> bool {
        let mut progress = self.carry(true);
        progress |= self.carry(false);
        progress |= service(&self.a);
        progress |= service(&self.b);
        progress
    }

    /// Step until nothing moves, at most `max_steps` times.
    ///
    /// Returns the number of steps that made progress.
    pub fn run_until_idle(&mut self, max_steps: usize) -> usize {
        let mut busy = 0;
        for _ in 0..max_steps {
            if !self.step() {
                break;
            }
            busy += 1;
        }
        busy
    }

    /// Bytes that crossed the line in either direction.
    pub fn carried(&self) -> u64 {
        self.carried
    }

    /// Bytes flipped by the noise model.
    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    /// Drive the line from a dedicated thread until the handle is stopped.
    pub fn spawn(self) -> LineHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut line = self;
                while !stop.load(Ordering::Acquire) {
                    if !line.step() {
                        std::thread::yield_now();
                    }
                }
                line
            })
        };
        debug!("simulated line thread started");
        LineHandle {
            stop,
            thread: Some(thread),
        }
    }

    fn carry(&mut self, a_to_b: bool) -> bool {
        let (from, to) = if a_to_b {
            (&self.a, &self.b)
        } else {
            (&self.b, &self.a)
        };
        if self.flow_control && to.driver().is_rx_fifo_full() {
            return false;
        }
        let Some(mut byte) = from.driver().shift_out() else {
            return false;
        };

        self.carried += 1;
        if let Some(noise) = self.noise {
            if self.carried % noise.every == 0 {
                trace!(original = byte, mask = noise.mask, "corrupting byte in flight");
                byte ^= noise.mask;
                self.corrupted += 1;
            }
        }
        to.driver().inject_rx(&[byte]);
        true
    }
}

fn service(transport: &SimulatedTransport) -> bool {
    let uart = transport.driver();

    if !uart.is_tx_full() {
        uart.raise(HardwareEvent::TransmitComplete);
        transport.on_event(HardwareEvent::TransmitComplete);
    }

    let before = uart.rx_fifo_len();
    if before == 0 {
        return false;
    }
    uart.raise(HardwareEvent::ReceiveData);
    transport.on_event(HardwareEvent::ReceiveData);
    uart.rx_fifo_len() < before
}

impl std::fmt::Debug for SimulatedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedLine")
            .field("noise", &self.noise)
            .field("flow_control", &self.flow_control)
            .field("carried", &self.carried)
            .field("corrupted", &self.corrupted)
            .finish_non_exhaustive()
    }
}

/// Handle to a line running on its own thread.
///
/// Dropping the handle stops the thread.
#[derive(Debug)]
pub struct LineHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<SimulatedLine>>,
}

impl LineHandle {
    /// Stop the thread and get the line back.
    ///
    /// Returns `None` if the line thread panicked.
    pub fn stop(mut self) -> Option<SimulatedLine> {
        self.stop.store(true, Ordering::Release);
        let line = self.thread.take()?.join().ok();
        debug!("simulated line thread stopped");
        line
    }
}

impl Drop for LineHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_bytes_both_ways() {
        let (a, b, mut line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
        a.write(b"ping");
        b.write(b"pong");
        line.run_until_idle(100);

        let mut buf = [0u8; 4];
        assert_eq!(b.readable(), 4);
        b.read(&mut buf);
        assert_eq!(&buf, b"ping");
        assert_eq!(a.readable(), 4);
        a.read(&mut buf);
        assert_eq!(&buf, b"pong");
        assert_eq!(line.carried(), 8);
    }

    #[test]
    fn idle_line_reports_no_progress() {
        let (_a, _b, mut line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
        assert!(!line.step());
        assert_eq!(line.run_until_idle(10), 0);
    }

    #[test]
    fn noise_flips_selected_bytes() {
        let (a, b, line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
        let mut line = line.with_noise(Noise {
            every: 2,
            mask: 0x01,
        });
        a.write(&[0x10, 0x10, 0x10, 0x10]);
        line.run_until_idle(100);

        let mut buf = [0u8; 4];
        b.read(&mut buf);
        assert_eq!(buf, [0x10, 0x11, 0x10, 0x11]);
        assert_eq!(line.corrupted(), 2);
    }

    #[test]
    fn slow_receiver_overruns_without_flow_control() {
        let config = TransportConfig {
            rx_capacity: 4,
            tx_capacity: 32,
        };
        let (a, b, mut line) = SimulatedLine::pair(config).unwrap();
        a.write(&[7u8; 16]);
        line.run_until_idle(100);

        // 4 in the ring, 4 in the FIFO, the rest lost.
        assert_eq!(b.readable(), 4);
        assert_eq!(b.driver().overruns(), 8);
    }

    #[test]
    fn flow_control_holds_bytes_until_receiver_drains() {
        let config = TransportConfig {
            rx_capacity: 4,
            tx_capacity: 32,
        };
        let (a, b, line) = SimulatedLine::pair(config).unwrap();
        let mut line = line.with_flow_control(true);
        a.write(&[7u8; 16]);
        line.run_until_idle(100);
        assert_eq!(b.readable(), 4);
        assert_eq!(b.driver().overruns(), 0);

        let mut buf = [0u8; 4];
        let mut total = 0;
        while total < 16 {
            let n = b.readable();
            total += b.read(&mut buf[..n]);
            line.run_until_idle(100);
        }
        assert_eq!(total, 16);
        assert_eq!(b.driver().overruns(), 0);
    }

    #[test]
    fn more_data_than_buffers_flows_through() {
        let config = TransportConfig {
            rx_capacity: 8,
            tx_capacity: 8,
        };
        let (a, b, mut line) = SimulatedLine::pair(config).unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 8];

        for chunk in (0u8..64).collect::<Vec<_>>().chunks(8) {
            a.write(chunk);
            line.run_until_idle(100);
            let n = b.readable();
            b.read(&mut buf[..n]);
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, (0u8..64).collect::<Vec<_>>());
    }
}
