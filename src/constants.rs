//! Serial Link Constants
//!
//! Baud-rate tables, tolerances and timing defaults shared by the resolver,
//! the timeout policy and the link itself.

/// Maximum relative error accepted when matching a requested rate against the
/// standard baud table (1.5%). Beyond it the rate is applied as a custom speed.
pub const BAUD_TOLERANCE: f64 = 0.015;

/// Bits on the wire per byte for an 8N1 frame (start + 8 data + stop).
pub const BITS_PER_BYTE: f64 = 10.0;

/// Default USB adapter latency timer in milliseconds (FTDI factory value).
pub const LATENCY_TIME_DEFAULT_MS: u8 = 16;

/// Accepted latency timer range in milliseconds.
pub const LATENCY_TIME_MIN_MS: u8 = 1;
pub const LATENCY_TIME_MAX_MS: u8 = 128;

/// Fixed scheduling margin added to every timeout budget, in milliseconds.
pub const TIMEOUT_FIXED_MARGIN_MS: f64 = 2.0;

/// Baud values below this are treated as a protocol baud index by
/// `BaudRequest::from_raw`.
pub const BAUD_INDEX_LIMIT: u32 = 255;

/// Path value that asks for the first scanned adapter.
pub const AUTO_DEVICE: &str = "auto";

/// Prefix of the lock artifact created next to other lockdev-style locks.
pub const LOCK_FILE_PREFIX: &str = "LCK..";

// ----------------------------------------------------------------------------
// Literal baud ranges and defaults per servo family
// ----------------------------------------------------------------------------

pub const HERKULEX_BAUD_MIN: u32 = 57_600;
pub const HERKULEX_BAUD_MAX: u32 = 1_000_000;
pub const DYNAMIXEL_BAUD_MIN: u32 = 2_400;
pub const DYNAMIXEL_BAUD_MAX: u32 = 10_500_000;

pub const HERKULEX_DEFAULT_BAUD: u32 = 115_200;
pub const DYNAMIXEL_DEFAULT_BAUD: u32 = 57_600;
pub const DYNAMIXEL_FAST_DEFAULT_BAUD: u32 = 1_000_000;
pub const GENERIC_DEFAULT_BAUD: u32 = 57_600;

// ----------------------------------------------------------------------------
// Adapter bandwidth caps
// ----------------------------------------------------------------------------

pub const FTDI_MAX_BAUD: u32 = 4_500_000;
pub const USB2AX_MAX_BAUD: u32 = 1_000_000;
pub const ZIG100_MAX_BAUD: u32 = 115_200;

// ----------------------------------------------------------------------------
// Baud index tables
// ----------------------------------------------------------------------------

/// Dynamixel XL-320 baud index table.
pub const DXL_XL320_BAUD_TABLE: [u32; 4] = [9_600, 57_600, 115_200, 1_000_000];

/// Dynamixel X series baud index table.
pub const DXL_X_BAUD_TABLE: [u32; 8] = [
    9_600, 57_600, 115_200, 1_000_000, 2_000_000, 3_000_000, 4_000_000, 4_500_000,
];

/// Dynamixel PRO baud index table.
pub const DXL_PRO_BAUD_TABLE: [u32; 8] = [
    9_600, 57_600, 115_200, 1_000_000, 2_000_000, 3_000_000, 4_000_000, 10_500_000,
];

/// HerkuleX baud index table, as (index, rate) pairs.
pub const HKX_BAUD_TABLE: [(u8, u32); 7] = [
    (0x02, 666_666),
    (0x03, 500_000),
    (0x04, 400_000),
    (0x07, 250_000),
    (0x09, 200_000),
    (0x10, 115_200),
    (0x22, 57_600),
];
