//! Interrupt-driven serial transport.
//!
//! The lowest layer of serlink: a duplex byte channel built from two
//! fixed-capacity ring buffers and two hardware-event handlers that move
//! bytes between those buffers and a UART.
//!
//! ```text
//!  write() ──► tx RingBuffer ──► on_transmit_complete() ──► UART TX
//!  read()  ◄── rx RingBuffer ◄── on_receive_data()      ◄── UART RX
//! ```
//!
//! The chip itself is reached through [`SerialDriver`]. [`SimulatedUart`] and
//! [`SimulatedLine`] provide a host-side stand-in used by the tests and the
//! CLI.

pub mod error;
pub mod line;
pub mod ring;
pub mod traits;
pub mod transport;
pub mod uart;

pub use error::{Result, TransportError};
pub use line::{LineHandle, Noise, SimulatedLine, SimulatedTransport};
pub use ring::{BufferStatus, RingBuffer, WriteOutcome, BYTE_WIDTH_BITS};
pub use traits::{HardwareEvent, SerialDriver};
pub use transport::{Transport, TransportConfig, TransportStats};
pub use uart::SimulatedUart;
