use std::sync::Arc;
use std::time::{Duration, Instant};

use serlink_transport::{SimulatedLine, SimulatedTransport, TransportConfig};

fn read_exactly(transport: &SimulatedTransport, len: usize, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        assert!(Instant::now() < deadline, "timed out after {} bytes", out.len());
        let want = transport.readable().min(buf.len()).min(len - out.len());
        if want == 0 {
            std::thread::yield_now();
            continue;
        }
        let n = transport.read(&mut buf[..want]);
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn threaded_line_delivers_stream_in_order() {
    let config = TransportConfig {
        rx_capacity: 16,
        tx_capacity: 8,
    };
    let (a, b, line) = SimulatedLine::pair(config).unwrap();
    let handle = line.with_flow_control(true).spawn();

    let data: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 251) as u8).collect();
    let writer = {
        let a = Arc::clone(&a);
        let data = data.clone();
        std::thread::spawn(move || {
            for chunk in data.chunks(13) {
                a.write(chunk);
            }
        })
    };

    let received = read_exactly(&b, data.len(), Duration::from_secs(10));
    writer.join().unwrap();
    let line = handle.stop().expect("line thread should not panic");

    assert_eq!(received, data);
    assert_eq!(line.carried(), data.len() as u64);
    assert_eq!(a.stats().bytes_queued, data.len() as u64);
    assert_eq!(b.stats().bytes_read, data.len() as u64);
    assert_eq!(b.driver().overruns(), 0);
}

#[test]
fn full_duplex_traffic() {
    let (a, b, line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
    let handle = line.with_flow_control(true).spawn();

    let to_b: Vec<u8> = (0..512u32).map(|i| i as u8).collect();
    let to_a: Vec<u8> = (0..512u32).map(|i| (255 - i % 256) as u8).collect();

    let sender_a = {
        let a = Arc::clone(&a);
        let data = to_b.clone();
        std::thread::spawn(move || a.write(&data))
    };
    let sender_b = {
        let b = Arc::clone(&b);
        let data = to_a.clone();
        std::thread::spawn(move || b.write(&data))
    };

    let got_b = read_exactly(&b, to_b.len(), Duration::from_secs(10));
    let got_a = read_exactly(&a, to_a.len(), Duration::from_secs(10));
    sender_a.join().unwrap();
    sender_b.join().unwrap();
    drop(handle);

    assert_eq!(got_b, to_b);
    assert_eq!(got_a, to_a);
}
