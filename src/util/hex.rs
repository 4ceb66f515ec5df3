//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used to dump transmitted and received frames in debug logs and
//! to accept frames typed on the command line.
//!
//! ```rust
//! use servo_serial::util::hex::{format_hex_compact, parse_hex_lenient};
//!
//! // Dynamixel v1 PING to id 1
//! let ping = parse_hex_lenient("FF FF 01 02 01 FB").unwrap();
//! assert_eq!(format_hex_compact(&ping), "ff ff 01 02 01 fb");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    ::hex::encode(data)
}

/// Parse a hex frame that may contain spaces or other separators
/// ("FF FF 01", "ff:ff:01", "0xff 0xff" are all accepted).
pub fn parse_hex_lenient(input: &str) -> Result<Vec<u8>, HexError> {
    let hex_chars: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == '-' || c == ',')
        .map(|tok| tok.trim_start_matches("0x").trim_start_matches("0X"))
        .flat_map(|tok| tok.chars())
        .collect();

    if hex_chars.is_empty() {
        return Err(HexError::EmptyString);
    }

    if hex_chars.len() % 2 != 0 {
        return Err(HexError::OddLength(hex_chars.len()));
    }

    ::hex::decode(&hex_chars).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "ff ff 01 02" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pretty-print hex data with an offset column and an ASCII gutter,
/// similar to `hexdump -C`.
pub fn pretty_hex(data: &[u8], bytes_per_line: usize) -> String {
    let bytes_per_line = bytes_per_line.max(1);
    data.chunks(bytes_per_line)
        .enumerate()
        .map(|(i, chunk)| {
            let hex_part = format_hex_compact(chunk);
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!(
                "{:04x}: {:<width$} |{}|",
                i * bytes_per_line,
                hex_part,
                ascii,
                width = bytes_per_line * 3 - 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode_hex(&[0xFF, 0xFD, 0x00]), "fffd00");
    }

    #[test]
    fn test_format_compact() {
        let data = vec![0xFF, 0xFF, 0x01, 0x02];
        assert_eq!(format_hex_compact(&data), "ff ff 01 02");
        assert_eq!(format_hex_compact(&[]), "");
    }

    #[test]
    fn test_parse_lenient() {
        let expected = vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB];
        assert_eq!(parse_hex_lenient("FF FF 01 02 01 FB").unwrap(), expected);
        assert_eq!(parse_hex_lenient("ff:ff:01:02:01:fb").unwrap(), expected);
        assert_eq!(parse_hex_lenient("0xff,0xff,0x01,0x02,0x01,0xfb").unwrap(), expected);
        assert_eq!(parse_hex_lenient("ffff010201fb").unwrap(), expected);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_hex_lenient(""), Err(HexError::EmptyString));
        assert_eq!(parse_hex_lenient("  "), Err(HexError::EmptyString));
        assert_eq!(parse_hex_lenient("fff"), Err(HexError::OddLength(3)));
        assert!(matches!(parse_hex_lenient("GG"), Err(HexError::DecodeError(_))));
    }

    #[test]
    fn test_pretty_hex() {
        let data = b"\xff\xff\x01AB";
        let pretty = pretty_hex(data, 4);
        let lines: Vec<&str> = pretty.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: ff ff 01 41"));
        assert!(lines[0].ends_with("|...A|"));
        assert!(lines[1].starts_with("0004: 42"));
        assert!(pretty_hex(&[], 16).is_empty());
    }
}
