//! Hex text for wire dumps.

use crate::exit::{CliError, CliResult, USAGE};

/// Lowercase hex, one space between bytes: `f7 01 02 7f`.
pub fn format(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Parse hex text. Whitespace, commas and `0x` prefixes are ignored, so both
/// `f7 01 7f` and `0xF7,0x01,0x7F` are accepted.
pub fn parse(text: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .replace("0x", "")
        .replace("0X", "")
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b',')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits ({})", digits.len()),
        ));
    }

    digits
        .chunks(2)
        .map(|pair| -> CliResult<u8> { Ok((nibble(pair[0])? << 4) | nibble(pair[1])?) })
        .collect()
}

fn nibble(digit: u8) -> CliResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(CliError::new(
            USAGE,
            format!("invalid hex digit: {:?}", char::from(other)),
        )),
    }
}
