use std::fs;
use std::io::Read;
use std::path::Path;

use serlink_frame::{DecodeStats, FrameCodec, FrameConfig, MemoryChannel};
use tracing::{debug, info};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::hex;
use crate::output::{print_decode_stats, print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(args.input.as_deref())?;
    let wire = if args.hex {
        let text = String::from_utf8(input).map_err(|_| {
            CliError::new(crate::exit::USAGE, "--hex input is not valid UTF-8 text")
        })?;
        hex::parse(&text)?
    } else {
        input
    };
    debug!(bytes = wire.len(), chunk = args.chunk, "decoding captured stream");

    let config = FrameConfig {
        buffer_capacity: args.buffer_capacity,
        max_payload_size: FrameConfig::max_payload_for(args.buffer_capacity),
    };
    let mut codec = FrameCodec::with_config(MemoryChannel::new(), config)
        .map_err(|err| frame_error("invalid decoder configuration", err))?;

    let mut index = 0;
    for chunk in wire.chunks(usize::from(args.chunk)) {
        codec.channel().feed(chunk);
        drain(&mut codec, |frame| {
            print_frame(index, &frame, format);
            index += 1;
        });
    }

    let stats = codec.stats();
    print_decode_stats(&stats, codec.buffered(), format);
    info!(
        frames = stats.frames,
        discarded = discarded(&stats),
        "decode finished"
    );

    if args.strict && discarded(&stats) > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} frame(s) discarded", discarded(&stats)),
        ));
    }
    Ok(SUCCESS)
}

/// Pull until the channel is empty and no complete frame is buffered.
fn drain(codec: &mut FrameCodec<MemoryChannel>, mut on_frame: impl FnMut(serlink_frame::Frame)) {
    loop {
        match codec.pull() {
            Ok(Some(frame)) => on_frame(frame),
            Ok(None) if codec.channel().is_empty() => return,
            Ok(None) => {}
            // Already logged and counted by the codec.
            Err(_) => {}
        }
    }
}

fn discarded(stats: &DecodeStats) -> u64 {
    stats.checksum_failures + stats.malformed + stats.oversized + stats.truncated
}

fn read_input(path: Option<&Path>) -> CliResult<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use serlink_frame::encode_frame;

    #[test]
    fn drain_collects_every_frame() {
        let mut wire = BytesMut::new();
        encode_frame(b"one", &mut wire);
        wire.extend_from_slice(&[0x00, 0x01]);
        encode_frame(b"two", &mut wire);

        let mut codec = FrameCodec::new(MemoryChannel::new());
        codec.channel().feed(&wire);
        let mut frames = Vec::new();
        drain(&mut codec, |frame| frames.push(frame.payload));

        assert_eq!(frames, vec![&b"one"[..], &b"two"[..]]);
        assert_eq!(codec.stats().garbage_bytes, 2);
    }

    #[test]
    fn discarded_counts_every_rejection() {
        let stats = DecodeStats {
            frames: 5,
            checksum_failures: 1,
            malformed: 2,
            oversized: 3,
            truncated: 4,
            garbage_bytes: 100,
        };
        assert_eq!(discarded(&stats), 10);
    }
}
