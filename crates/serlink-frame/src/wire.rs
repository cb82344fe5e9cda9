//! Wire alphabet and byte stuffing.
//!
//! ```text
//! ┌───────┬──────────────────┬────────────┬────────────┬─────┐
//! │ START │ escaped payload  │ esc(sum1)  │ esc(sum2)  │ END │
//! │ 0xF7  │ 0..n bytes       │ 1-2 bytes  │ 1-2 bytes  │ 0x7F│
//! └───────┴──────────────────┴────────────┴────────────┴─────┘
//! ```
//!
//! Inside a frame a reserved byte `b` is sent as `ESC, b ^ ESC_XOR`, so the
//! delimiters only ever appear on the wire as delimiters.

use crate::error::{FrameError, Result};

/// Frame start marker. Never escaped.
pub const START: u8 = 0xF7;

/// Frame end marker. Never escaped.
pub const END: u8 = 0x7F;

/// Escape introducer.
pub const ESC: u8 = 0xF6;

/// Mask applied to an escaped byte.
pub const ESC_XOR: u8 = 0x20;

/// Delimiters plus the checksum pair when every byte needs escaping.
pub const MAX_OVERHEAD: usize = 1 + 4 + 1;

/// Whether `byte` must be escaped inside a frame.
#[inline]
pub fn is_reserved(byte: u8) -> bool {
    byte == START || byte == END || byte == ESC
}

/// Stuff one byte. Returns the one or two bytes to put on the wire.
#[inline]
pub fn escape(byte: u8, out: &mut [u8; 2]) -> &[u8] {
    if is_reserved(byte) {
        out[0] = ESC;
        out[1] = byte ^ ESC_XOR;
        &out[..]
    } else {
        out[0] = byte;
        &out[..1]
    }
}

/// Number of wire bytes a frame carrying `payload` occupies.
pub fn encoded_len(payload: &[u8], checksum: (u8, u8)) -> usize {
    let stuffed = |b: &u8| if is_reserved(*b) { 2 } else { 1 };
    2 + payload.iter().map(stuffed).sum::<usize>() + stuffed(&checksum.0) + stuffed(&checksum.1)
}

/// Worst-case wire size of a frame carrying `payload_len` bytes.
pub const fn max_encoded_len(payload_len: usize) -> usize {
    payload_len * 2 + MAX_OVERHEAD
}

/// Undo byte stuffing on the bytes strictly between the delimiters.
pub fn unstuff(body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESC {
            let Some(&escaped) = bytes.next() else {
                return Err(FrameError::Malformed {
                    reason: "escape marker before end of frame",
                });
            };
            out.push(escaped ^ ESC_XOR);
        } else {
            out.push(byte);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_bytes_are_escaped() {
        let mut out = [0u8; 2];
        assert_eq!(escape(START, &mut out), &[ESC, 0xD7]);
        assert_eq!(escape(END, &mut out), &[ESC, 0x5F]);
        assert_eq!(escape(ESC, &mut out), &[ESC, 0xD6]);
        assert_eq!(escape(0x41, &mut out), &[0x41]);
    }

    #[test]
    fn escaped_form_never_contains_delimiters() {
        let mut out = [0u8; 2];
        for byte in 0..=255u8 {
            let wire = escape(byte, &mut out).to_vec();
            assert!(!wire.contains(&START) && !wire.contains(&END), "byte {byte:#04x}");
        }
    }

    #[test]
    fn unstuff_reverses_escape() {
        let body = [0x01, ESC, 0xD7, ESC, 0x5F, ESC, 0xD6, 0x02];
        assert_eq!(unstuff(&body).unwrap(), vec![0x01, START, END, ESC, 0x02]);
    }

    #[test]
    fn dangling_escape_is_malformed() {
        let err = unstuff(&[0x01, ESC]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed { .. }));
    }

    #[test]
    fn encoded_len_counts_stuffing() {
        assert_eq!(encoded_len(&[0x01, 0x02, START], (0xFA, 0xFE)), 8);
        assert_eq!(encoded_len(&[], (0, 0)), 4);
        assert_eq!(encoded_len(&[ESC], (ESC, START)), 8);
        assert_eq!(max_encoded_len(3), 12);
    }
}
