use std::time::{Duration, Instant};

use serlink_frame::{Frame, FrameCodec, FrameError};
use serlink_transport::{Noise, SimulatedLine, SimulatedTransport, TransportConfig};

fn next_frame(
    codec: &mut FrameCodec<&SimulatedTransport>,
    timeout: Duration,
) -> Result<Frame, FrameError> {
    let deadline = Instant::now() + timeout;
    loop {
        assert!(Instant::now() < deadline, "timed out waiting for a frame");
        match codec.pull() {
            Ok(Some(frame)) => return Ok(frame),
            Ok(None) => std::thread::yield_now(),
            Err(err) => return Err(err),
        }
    }
}

#[test]
fn frames_cross_a_threaded_line() {
    let (a, b, line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
    let handle = line.with_flow_control(true).spawn();

    let payloads: Vec<Vec<u8>> = (0..20u8)
        .map(|i| (0..u16::from(i) * 9).map(|j| (j as u8) ^ 0xF0).collect())
        .collect();

    let sender = {
        let payloads = payloads.clone();
        std::thread::spawn(move || {
            let mut codec = FrameCodec::new(&*a);
            for payload in &payloads {
                codec.send(payload).unwrap();
            }
        })
    };

    let mut codec = FrameCodec::new(&*b);
    for expected in &payloads {
        let frame = next_frame(&mut codec, Duration::from_secs(10)).unwrap();
        assert_eq!(frame.payload.as_ref(), expected.as_slice());
    }
    sender.join().unwrap();
    drop(handle);

    assert_eq!(codec.stats().frames, payloads.len() as u64);
    assert_eq!(codec.stats().checksum_failures, 0);
}

#[test]
fn noisy_line_loses_frames_but_not_sync() {
    let (a, b, mut line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
    line = line.with_flow_control(true).with_noise(Noise {
        every: 23,
        mask: 0x01,
    });

    let mut tx = FrameCodec::new(&*a);
    let mut rx = FrameCodec::new(&*b);
    let mut delivered = 0;
    let mut rejected = 0;
    for i in 0..40u8 {
        tx.send(&[i, i.wrapping_add(1), i.wrapping_add(2)]).unwrap();
        line.run_until_idle(1_000);
        loop {
            match rx.pull() {
                Ok(Some(frame)) => {
                    assert_eq!(frame.payload[1], frame.payload[0].wrapping_add(1));
                    delivered += 1;
                }
                Ok(None) => break,
                Err(_) => rejected += 1,
            }
        }
    }

    assert!(line.corrupted() > 0);
    assert!(rejected > 0);
    assert!(delivered > 20, "only {delivered} frames survived");
}
