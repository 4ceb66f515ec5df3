//! # Utility Modules
//!
//! Common helpers used throughout the servo-serial crate.

pub mod hex;

pub use hex::{encode_hex, format_hex_compact, parse_hex_lenient, pretty_hex, HexError};
