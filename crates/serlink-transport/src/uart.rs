use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::traits::{HardwareEvent, SerialDriver};

/// Hardware FIFO depth of the simulated UART, per direction.
pub const DEFAULT_FIFO_DEPTH: usize = 4;

#[derive(Debug)]
struct UartState {
    enabled: bool,
    tx_fifo: VecDeque<u8>,
    rx_fifo: VecDeque<u8>,
    tx_depth: usize,
    rx_depth: usize,
    tx_pending: bool,
    rx_pending: bool,
    overruns: u64,
}

/// In-memory UART peripheral.
///
/// Models the registers a [`Transport`](crate::Transport) talks to: a small
/// transmit FIFO that the line shifts bytes out of, a small receive FIFO
/// that the line shifts bytes into, and the two interrupt-pending flags.
/// Bytes arriving while the receive FIFO is full are lost and counted as
/// overruns, as on real hardware.
#[derive(Debug)]
pub struct SimulatedUart {
    state: Mutex<UartState>,
}

impl SimulatedUart {
    pub fn new() -> Self {
        Self::with_fifo_depth(DEFAULT_FIFO_DEPTH, DEFAULT_FIFO_DEPTH)
    }

    /// Build a UART with explicit FIFO depths (each at least 1).
    pub fn with_fifo_depth(tx_depth: usize, rx_depth: usize) -> Self {
        Self {
            state: Mutex::new(UartState {
                enabled: false,
                tx_fifo: VecDeque::with_capacity(tx_depth.max(1)),
                rx_fifo: VecDeque::with_capacity(rx_depth.max(1)),
                tx_depth: tx_depth.max(1),
                rx_depth: rx_depth.max(1),
                tx_pending: false,
                rx_pending: false,
                overruns: 0,
            }),
        }
    }

    /// Deliver bytes from the line into the receive FIFO.
    ///
    /// Returns how many were accepted. A disabled receiver accepts nothing;
    /// bytes beyond the FIFO depth are overruns. Accepting a byte raises the
    /// receive-data pending flag.
    pub fn inject_rx(&self, bytes: &[u8]) -> usize {
        let mut state = self.state();
        if !state.enabled {
            return 0;
        }
        let mut accepted = 0;
        for &byte in bytes {
            if state.rx_fifo.len() < state.rx_depth {
                state.rx_fifo.push_back(byte);
                accepted += 1;
            } else {
                state.overruns += 1;
            }
        }
        if accepted > 0 {
            state.rx_pending = true;
        }
        accepted
    }

    /// Shift the oldest byte out of the transmit FIFO onto the line.
    ///
    /// Emptying the FIFO raises the transmit-complete pending flag.
    pub fn shift_out(&self) -> Option<u8> {
        let mut state = self.state();
        if !state.enabled {
            return None;
        }
        let byte = state.tx_fifo.pop_front()?;
        if state.tx_fifo.is_empty() {
            state.tx_pending = true;
        }
        Some(byte)
    }

    /// Mark an interrupt as pending, as the peripheral would.
    pub fn raise(&self, event: HardwareEvent) {
        let mut state = self.state();
        match event {
            HardwareEvent::TransmitComplete => state.tx_pending = true,
            HardwareEvent::ReceiveData => state.rx_pending = true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn tx_pending(&self) -> bool {
        self.state().tx_pending
    }

    pub fn rx_pending(&self) -> bool {
        self.state().rx_pending
    }

    pub fn tx_fifo_len(&self) -> usize {
        self.state().tx_fifo.len()
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.state().rx_fifo.len()
    }

    pub fn tx_fifo_depth(&self) -> usize {
        self.state().tx_depth
    }

    /// Whether the next byte from the line would be an overrun.
    pub fn is_rx_fifo_full(&self) -> bool {
        let state = self.state();
        state.rx_fifo.len() >= state.rx_depth
    }

    /// Bytes lost because the receive FIFO was full.
    pub fn overruns(&self) -> u64 {
        self.state().overruns
    }

    fn state(&self) -> MutexGuard<'_, UartState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedUart {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialDriver for SimulatedUart {
    fn enable(&self) {
        self.state().enabled = true;
    }

    fn disable(&self) {
        let mut state = self.state();
        state.enabled = false;
        state.tx_fifo.clear();
        state.rx_fifo.clear();
    }

    fn is_tx_full(&self) -> bool {
        let state = self.state();
        state.tx_fifo.len() >= state.tx_depth
    }

    fn write_tx(&self, byte: u8) {
        let mut state = self.state();
        if state.tx_fifo.len() < state.tx_depth {
            state.tx_fifo.push_back(byte);
        }
    }

    fn is_rx_available(&self) -> bool {
        !self.state().rx_fifo.is_empty()
    }

    fn read_rx(&self) -> u8 {
        // Reading an empty receive register yields zero, like the real part.
        self.state().rx_fifo.pop_front().unwrap_or(0)
    }

    fn clear_tx_pending(&self) {
        self.state().tx_pending = false;
    }

    fn clear_rx_pending(&self) {
        self.state().rx_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_uart_ignores_traffic() {
        let uart = SimulatedUart::new();
        assert_eq!(uart.inject_rx(&[1, 2]), 0);
        uart.write_tx(3);
        assert_eq!(uart.shift_out(), None);
    }

    #[test]
    fn rx_fifo_overrun_is_counted() {
        let uart = SimulatedUart::with_fifo_depth(4, 2);
        uart.enable();
        assert_eq!(uart.inject_rx(&[1, 2, 3]), 2);
        assert_eq!(uart.overruns(), 1);
        assert!(uart.rx_pending());
        assert_eq!(uart.read_rx(), 1);
        assert_eq!(uart.read_rx(), 2);
        assert!(!uart.is_rx_available());
    }

    #[test]
    fn tx_fifo_reports_full_and_shifts_in_order() {
        let uart = SimulatedUart::with_fifo_depth(2, 4);
        uart.enable();
        uart.write_tx(1);
        assert!(!uart.is_tx_full());
        uart.write_tx(2);
        assert!(uart.is_tx_full());

        assert_eq!(uart.shift_out(), Some(1));
        assert!(!uart.tx_pending());
        assert_eq!(uart.shift_out(), Some(2));
        assert!(uart.tx_pending());
        uart.clear_tx_pending();
        assert!(!uart.tx_pending());
    }

    #[test]
    fn disable_flushes_fifos() {
        let uart = SimulatedUart::new();
        uart.enable();
        uart.write_tx(1);
        uart.inject_rx(&[2]);
        uart.disable();
        uart.enable();
        assert_eq!(uart.tx_fifo_len(), 0);
        assert_eq!(uart.rx_fifo_len(), 0);
    }
}
