use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serlink_frame::{DecodeStats, Frame};

use crate::hex;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    schema_id: &'a str,
    index: usize,
    payload_size: usize,
    payload: String,
    payload_hex: String,
}

pub fn print_frame(index: usize, frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                schema_id: "https://schemas.3leaps.dev/serlink/cli/v1/frame-decoded.schema.json",
                index,
                payload_size: frame.len(),
                payload: payload_preview(frame.payload.as_ref()),
                payload_hex: hex::format(frame.payload.as_ref()),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    frame.len().to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} size={} payload={}",
                index,
                frame.len(),
                payload_preview(frame.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.payload.as_ref());
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    schema_id: &'a str,
    frames: u64,
    checksum_failures: u64,
    malformed: u64,
    oversized: u64,
    truncated: u64,
    garbage_bytes: u64,
    pending_bytes: usize,
}

pub fn print_decode_stats(stats: &DecodeStats, pending_bytes: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                schema_id: "https://schemas.3leaps.dev/serlink/cli/v1/decode-stats.schema.json",
                frames: stats.frames,
                checksum_failures: stats.checksum_failures,
                malformed: stats.malformed,
                oversized: stats.oversized,
                truncated: stats.truncated,
                garbage_bytes: stats.garbage_bytes,
                pending_bytes,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("frames", stats.frames),
                ("checksum failures", stats.checksum_failures),
                ("malformed", stats.malformed),
                ("oversized", stats.oversized),
                ("truncated", stats.truncated),
                ("garbage bytes", stats.garbage_bytes),
                ("pending bytes", pending_bytes as u64),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} checksum_failures={} malformed={} oversized={} truncated={} garbage_bytes={} pending_bytes={}",
                stats.frames,
                stats.checksum_failures,
                stats.malformed,
                stats.oversized,
                stats.truncated,
                stats.garbage_bytes,
                pending_bytes
            );
        }
        // Raw output carries payloads only.
        OutputFormat::Raw => {}
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Render a two-column key/value table.
pub fn print_table(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value.clone()]);
    }
    println!("{table}");
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes>", payload.len()),
    }
}
