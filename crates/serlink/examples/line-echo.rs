//! Echo frames across a simulated serial line.
//!
//! Two transports share a line driven by its own thread, which stands in for
//! the UART interrupts. One side sends messages; the other echoes every frame
//! it decodes.
//!
//! Run with:
//!   cargo run --example line-echo

use std::thread;
use std::time::{Duration, Instant};

use serlink::frame::FrameCodec;
use serlink::transport::{SimulatedLine, TransportConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host, device, line) = SimulatedLine::pair(TransportConfig::default())?;
    let _line = line.with_flow_control(true).spawn();

    let echo = thread::spawn(move || -> Result<(), serlink::frame::FrameError> {
        let mut codec = FrameCodec::new(&*device);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut echoed = 0;
        while echoed < 3 && Instant::now() < deadline {
            match codec.pull() {
                Ok(Some(frame)) => {
                    eprintln!("[device] received {} bytes", frame.len());
                    codec.send(&frame.payload)?;
                    echoed += 1;
                }
                Ok(None) => thread::yield_now(),
                Err(err) => eprintln!("[device] dropped frame: {err}"),
            }
        }
        Ok(())
    });

    let mut codec = FrameCodec::new(&*host);
    for message in ["hello", "end marker \x7f inside", "bye"] {
        codec.send(message.as_bytes())?;
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(frame) = codec.pull()? {
                eprintln!("[host] echo: {}", String::from_utf8_lossy(&frame.payload));
                break;
            }
            if Instant::now() >= deadline {
                return Err("no echo within 5s".into());
            }
            thread::yield_now();
        }
    }

    echo.join().map_err(|_| "echo thread panicked")??;
    Ok(())
}
