use std::sync::Arc;

/// Register-level access to a UART peripheral.
///
/// This is the boundary between the transport and the chip: baud-rate setup,
/// pin muxing and interrupt priorities all live behind it. Every method takes
/// `&self` because the registers are shared between main context and the
/// hardware-event handlers, exactly like memory-mapped I/O.
///
/// Implementations must not block in any of these calls; the handlers that
/// invoke them run in interrupt context on real hardware.
pub trait SerialDriver: Send + Sync {
    /// Turn the transmitter and receiver on.
    fn enable(&self);

    /// Turn the transmitter and receiver off.
    fn disable(&self);

    /// Whether the hardware transmit slot cannot take another byte.
    fn is_tx_full(&self) -> bool;

    /// Place one byte in the hardware transmit slot.
    ///
    /// Only called after [`is_tx_full`](Self::is_tx_full) returned `false`.
    fn write_tx(&self, byte: u8);

    /// Whether the hardware holds at least one received byte.
    fn is_rx_available(&self) -> bool;

    /// Take one byte from the hardware receive slot.
    ///
    /// Only called after [`is_rx_available`](Self::is_rx_available) returned `true`.
    fn read_rx(&self) -> u8;

    /// Acknowledge the transmit-complete interrupt.
    fn clear_tx_pending(&self);

    /// Acknowledge the receive-data interrupt.
    fn clear_rx_pending(&self);
}

impl<D: SerialDriver + ?Sized> SerialDriver for Arc<D> {
    fn enable(&self) {
        (**self).enable()
    }

    fn disable(&self) {
        (**self).disable()
    }

    fn is_tx_full(&self) -> bool {
        (**self).is_tx_full()
    }

    fn write_tx(&self, byte: u8) {
        (**self).write_tx(byte)
    }

    fn is_rx_available(&self) -> bool {
        (**self).is_rx_available()
    }

    fn read_rx(&self) -> u8 {
        (**self).read_rx()
    }

    fn clear_tx_pending(&self) {
        (**self).clear_tx_pending()
    }

    fn clear_rx_pending(&self) {
        (**self).clear_rx_pending()
    }
}

/// Hardware events a UART raises towards the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareEvent {
    /// The transmit shift register became empty.
    TransmitComplete,
    /// At least one byte arrived in the receive slot.
    ReceiveData,
}
