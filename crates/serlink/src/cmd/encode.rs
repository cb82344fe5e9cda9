use std::fs;

use bytes::BytesMut;
use serde::Serialize;
use serlink_frame::{encode_frame, encoded_len, Fletcher16};
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::hex;
use crate::output::{print_json, print_raw, print_table, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    schema_id: &'static str,
    payload_size: usize,
    wire_size: usize,
    checksum: String,
    wire: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let mut checksum = Fletcher16::new();
    checksum.update_slice(&payload);
    let wire_size = encoded_len(&payload, checksum.sums());

    let mut wire = BytesMut::with_capacity(wire_size);
    encode_frame(&payload, &mut wire);
    debug!(payload = payload.len(), wire = wire_size, "frame encoded");

    let output = EncodeOutput {
        schema_id: "https://schemas.3leaps.dev/serlink/cli/v1/frame-encoded.schema.json",
        payload_size: payload.len(),
        wire_size,
        checksum: format!("{:#06x}", checksum.value()),
        wire: hex::format(&wire),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => print_table(&[
            ("payload size", output.payload_size.to_string()),
            ("wire size", output.wire_size.to_string()),
            ("checksum", output.checksum.clone()),
            ("wire", output.wire.clone()),
        ]),
        OutputFormat::Pretty => println!("{}", output.wire),
        OutputFormat::Raw => print_raw(&wire),
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(text) = &args.hex {
        return hex::parse(text);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
