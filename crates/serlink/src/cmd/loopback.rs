use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use serlink_frame::{FrameCodec, FrameConfig};
use serlink_transport::{Noise, SimulatedLine, SimulatedTransport, TransportConfig};
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, LoopbackArgs};
use crate::exit::{
    frame_error, transport_error, CliError, CliResult, DATA_INVALID, FAILURE, INTERNAL, SUCCESS,
    TIMEOUT, USAGE,
};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Debug, Serialize)]
struct LoopbackReport {
    schema_id: &'static str,
    frames_sent: usize,
    delivered: usize,
    discarded: u64,
    lost: usize,
    mismatched: usize,
    bytes_carried: u64,
    bytes_corrupted: u64,
    handler_deferrals: u64,
    elapsed_ms: u64,
}

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let limit = FrameConfig::default().max_payload_size;
    if args.size > limit {
        return Err(CliError::new(
            USAGE,
            format!("--size {} exceeds the maximum payload of {limit} bytes", args.size),
        ));
    }

    let config = TransportConfig {
        rx_capacity: args.rx_capacity,
        tx_capacity: args.tx_capacity,
    };
    let (a, b, line) =
        SimulatedLine::pair(config).map_err(|err| transport_error("invalid line setup", err))?;
    let line = line.with_flow_control(true).with_noise(Noise {
        every: args.corrupt_every,
        mask: 0x01,
    });

    let started = Instant::now();
    let handle = line.spawn();
    let sender = {
        let a = Arc::clone(&a);
        let (count, size) = (args.count, args.size);
        thread::spawn(move || -> serlink_frame::Result<()> {
            let mut codec = FrameCodec::new(&*a);
            for index in 0..count {
                codec.send(&pattern(index, size))?;
            }
            Ok(())
        })
    };

    let mut receiver = Receiver::new(&b, args.size);
    let outcome = receiver.run(args.count, started + timeout, || {
        sender.is_finished() && line_is_idle(&a, &b)
    });
    // A timed-out sender may be stuck behind a full line; leave it detached.
    let sender_result = (outcome != Outcome::TimedOut).then(|| sender.join());
    let line = handle.stop();

    let stats = receiver.codec.stats();
    let discarded = stats.checksum_failures + stats.malformed + stats.oversized + stats.truncated;
    let report = LoopbackReport {
        schema_id: "https://schemas.3leaps.dev/serlink/cli/v1/loopback-report.schema.json",
        frames_sent: args.count,
        delivered: receiver.delivered,
        discarded,
        lost: args
            .count
            .saturating_sub(receiver.delivered + discarded as usize),
        mismatched: receiver.mismatched,
        bytes_carried: line.as_ref().map_or(0, SimulatedLine::carried),
        bytes_corrupted: line.as_ref().map_or(0, SimulatedLine::corrupted),
        handler_deferrals: [a.stats(), b.stats()]
            .iter()
            .map(|s| s.tx_events_deferred + s.rx_events_deferred)
            .sum(),
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        delivered = report.delivered,
        discarded = report.discarded,
        lost = report.lost,
        "loopback finished"
    );

    match sender_result {
        Some(Ok(Ok(()))) | None => {}
        Some(Ok(Err(err))) => return Err(frame_error("send failed", err)),
        Some(Err(_)) => return Err(CliError::new(INTERNAL, "sender thread panicked")),
    }
    if line.is_none() {
        return Err(CliError::new(INTERNAL, "line thread panicked"));
    }

    print_report(&report, format);

    if outcome == Outcome::TimedOut {
        return Err(CliError::new(
            TIMEOUT,
            format!(
                "timed out after {timeout:?} with {} of {} frames delivered",
                report.delivered, report.frames_sent
            ),
        ));
    }
    if report.mismatched > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} frame(s) arrived with wrong contents", report.mismatched),
        ));
    }
    if args.corrupt_every == 0 && report.delivered != report.frames_sent {
        return Err(CliError::new(
            FAILURE,
            format!(
                "clean line delivered {} of {} frames",
                report.delivered, report.frames_sent
            ),
        ));
    }
    Ok(SUCCESS)
}

/// Payload of the `index`-th frame. Every frame differs from its neighbours.
fn pattern(index: usize, size: usize) -> Vec<u8> {
    (0..size)
        .map(|j| (index.wrapping_mul(31).wrapping_add(j.wrapping_mul(7))) as u8)
        .collect()
}

fn line_is_idle(a: &SimulatedTransport, b: &SimulatedTransport) -> bool {
    a.writeable() == a.config().tx_capacity
        && a.driver().tx_fifo_len() == 0
        && b.driver().rx_fifo_len() == 0
        && b.readable() == 0
}

const SETTLE: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Complete,
    Drained,
    TimedOut,
}

struct Receiver<'a> {
    codec: FrameCodec<&'a SimulatedTransport>,
    size: usize,
    next_index: usize,
    delivered: usize,
    mismatched: usize,
}

impl<'a> Receiver<'a> {
    fn new(transport: &'a SimulatedTransport, size: usize) -> Self {
        Self {
            codec: FrameCodec::new(transport),
            size,
            next_index: 0,
            delivered: 0,
            mismatched: 0,
        }
    }

    /// Pull frames until `expected` have arrived, the line has gone quiet,
    /// or `deadline` passes.
    fn run(
        &mut self,
        expected: usize,
        deadline: Instant,
        mut idle: impl FnMut() -> bool,
    ) -> Outcome {
        loop {
            if self.delivered >= expected {
                return Outcome::Complete;
            }
            match self.codec.pull() {
                Ok(Some(frame)) => self.check(&frame.payload, expected),
                Ok(None) => {
                    if self.codec.channel().readable() == 0 && idle() {
                        // A byte may be between the two UARTs; look again after it lands.
                        thread::sleep(SETTLE);
                        if idle() {
                            self.drain(expected);
                            return Outcome::Drained;
                        }
                    }
                    if Instant::now() >= deadline {
                        return Outcome::TimedOut;
                    }
                    thread::sleep(Duration::from_micros(50));
                }
                Err(err) => debug!(error = %err, "frame discarded"),
            }
        }
    }

    fn drain(&mut self, expected: usize) {
        loop {
            match self.codec.pull() {
                Ok(Some(frame)) => self.check(&frame.payload, expected),
                Ok(None) => break,
                Err(err) => debug!(error = %err, "frame discarded"),
            }
        }
        debug!(buffered = self.codec.buffered(), "line drained");
    }

    fn check(&mut self, payload: &[u8], expected: usize) {
        self.delivered += 1;
        match (self.next_index..expected).find(|&i| pattern(i, self.size) == payload) {
            Some(index) => self.next_index = index + 1,
            None => {
                self.mismatched += 1;
                warn!(len = payload.len(), "frame passed checksum with unexpected contents");
            }
        }
    }
}

fn print_report(report: &LoopbackReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => print_table(&[
            ("frames sent", report.frames_sent.to_string()),
            ("delivered", report.delivered.to_string()),
            ("discarded", report.discarded.to_string()),
            ("lost", report.lost.to_string()),
            ("mismatched", report.mismatched.to_string()),
            ("bytes carried", report.bytes_carried.to_string()),
            ("bytes corrupted", report.bytes_corrupted.to_string()),
            ("handler deferrals", report.handler_deferrals.to_string()),
            ("elapsed", format!("{} ms", report.elapsed_ms)),
        ]),
        OutputFormat::Pretty | OutputFormat::Raw => println!(
            "sent={} delivered={} discarded={} lost={} mismatched={} carried={} corrupted={} elapsed_ms={}",
            report.frames_sent,
            report.delivered,
            report.discarded,
            report.lost,
            report.mismatched,
            report.bytes_carried,
            report.bytes_corrupted,
            report.elapsed_ms
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_differ_between_frames() {
        assert_eq!(pattern(0, 4), vec![0, 7, 14, 21]);
        assert_ne!(pattern(1, 8), pattern(2, 8));
        assert!(pattern(5, 0).is_empty());
    }

    #[test]
    fn receiver_tracks_order_and_mismatches() {
        let (_a, b, _line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
        let mut receiver = Receiver::new(&b, 4);
        receiver.check(&pattern(0, 4), 3);
        receiver.check(&pattern(2, 4), 3);
        receiver.check(&pattern(1, 4), 3);
        assert_eq!(receiver.delivered, 3);
        assert_eq!(receiver.mismatched, 1);
        assert_eq!(receiver.next_index, 3);
    }

    #[test]
    fn idle_line_with_nothing_sent_drains_immediately() {
        let (_a, b, _line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
        let mut receiver = Receiver::new(&b, 4);
        let outcome = receiver.run(1, Instant::now() + Duration::from_secs(5), || true);
        assert_eq!(outcome, Outcome::Drained);
        assert_eq!(receiver.delivered, 0);
    }

    #[test]
    fn nothing_expected_is_complete() {
        let (_a, b, _line) = SimulatedLine::pair(TransportConfig::default()).unwrap();
        let mut receiver = Receiver::new(&b, 4);
        let outcome = receiver.run(0, Instant::now(), || false);
        assert_eq!(outcome, Outcome::Complete);
    }
}
