//! # Baud Rate Resolution
//!
//! Turns a requested baud rate, or a protocol "baud index", into either one of
//! the host's standard rate identifiers or a custom speed that the device-open
//! step has to apply through the non-standard configuration path.
//!
//! Resolution is pure: no device is touched, so a link configuration can be
//! validated long before it is opened.
//!
//! ```rust
//! use servo_serial::serial::baud::{BaudRateResolver, BaudRequest, StandardBaud};
//!
//! let resolver = BaudRateResolver::default();
//! let res = resolver.resolve(BaudRequest::Literal(57_599));
//! assert_eq!(res.standard_id(), Some(StandardBaud::Baud57600));
//!
//! let res = resolver.resolve(BaudRequest::Literal(500_000));
//! assert_eq!(res.custom_rate(), Some(500_000));
//! ```

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::Serialize;

use crate::constants::*;

/// Standard rate identifiers available on every host (the portable termios set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardBaud {
    Baud50,
    Baud75,
    Baud110,
    Baud134,
    Baud150,
    Baud200,
    Baud300,
    Baud600,
    Baud1200,
    Baud1800,
    Baud2400,
    Baud4800,
    Baud9600,
    Baud19200,
    Baud38400,
    Baud57600,
    Baud115200,
    Baud230400,
}

impl StandardBaud {
    /// All standard identifiers in ascending order.
    pub const ALL: [StandardBaud; 18] = [
        StandardBaud::Baud50,
        StandardBaud::Baud75,
        StandardBaud::Baud110,
        StandardBaud::Baud134,
        StandardBaud::Baud150,
        StandardBaud::Baud200,
        StandardBaud::Baud300,
        StandardBaud::Baud600,
        StandardBaud::Baud1200,
        StandardBaud::Baud1800,
        StandardBaud::Baud2400,
        StandardBaud::Baud4800,
        StandardBaud::Baud9600,
        StandardBaud::Baud19200,
        StandardBaud::Baud38400,
        StandardBaud::Baud57600,
        StandardBaud::Baud115200,
        StandardBaud::Baud230400,
    ];

    /// Get the numeric value of this identifier in bits per second.
    pub fn as_u32(self) -> u32 {
        match self {
            StandardBaud::Baud50 => 50,
            StandardBaud::Baud75 => 75,
            StandardBaud::Baud110 => 110,
            StandardBaud::Baud134 => 134,
            StandardBaud::Baud150 => 150,
            StandardBaud::Baud200 => 200,
            StandardBaud::Baud300 => 300,
            StandardBaud::Baud600 => 600,
            StandardBaud::Baud1200 => 1200,
            StandardBaud::Baud1800 => 1800,
            StandardBaud::Baud2400 => 2400,
            StandardBaud::Baud4800 => 4800,
            StandardBaud::Baud9600 => 9600,
            StandardBaud::Baud19200 => 19200,
            StandardBaud::Baud38400 => 38400,
            StandardBaud::Baud57600 => 57600,
            StandardBaud::Baud115200 => 115200,
            StandardBaud::Baud230400 => 230400,
        }
    }

    /// Exact lookup, no tolerance.
    pub fn from_exact(rate: u32) -> Option<StandardBaud> {
        Self::ALL.iter().copied().find(|b| b.as_u32() == rate)
    }
}

impl fmt::Display for StandardBaud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// A baud configuration as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRequest {
    /// A bit rate in bits per second.
    Literal(u32),
    /// A protocol-specific baud index ("baudnum").
    Index(u8),
}

impl BaudRequest {
    /// Interpret a raw integer the way servo configuration tools do: anything
    /// below 255 is a baud index, everything else a literal rate.
    pub fn from_raw(value: u32) -> Self {
        if value < BAUD_INDEX_LIMIT {
            BaudRequest::Index(value as u8)
        } else {
            BaudRequest::Literal(value)
        }
    }
}

impl From<u32> for BaudRequest {
    fn from(rate: u32) -> Self {
        BaudRequest::Literal(rate)
    }
}

/// Outcome of resolving a [`BaudRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudResolution {
    /// The rate maps onto a standard identifier (exactly or within tolerance).
    Standard(StandardBaud),
    /// No standard identifier is close enough; apply this exact rate.
    Custom(u32),
}

impl BaudResolution {
    pub fn is_standard(&self) -> bool {
        matches!(self, BaudResolution::Standard(_))
    }

    pub fn standard_id(&self) -> Option<StandardBaud> {
        match self {
            BaudResolution::Standard(id) => Some(*id),
            BaudResolution::Custom(_) => None,
        }
    }

    pub fn custom_rate(&self) -> Option<u32> {
        match self {
            BaudResolution::Standard(_) => None,
            BaudResolution::Custom(rate) => Some(*rate),
        }
    }

    /// The rate that ends up on the wire.
    pub fn rate(&self) -> u32 {
        match self {
            BaudResolution::Standard(id) => id.as_u32(),
            BaudResolution::Custom(rate) => *rate,
        }
    }

    pub fn report(&self, requested: BaudRequest) -> ResolutionReport {
        ResolutionReport {
            requested: match requested {
                BaudRequest::Literal(rate) => rate,
                BaudRequest::Index(index) => u32::from(index),
            },
            requested_as_index: matches!(requested, BaudRequest::Index(_)),
            rate: self.rate(),
            is_standard: self.is_standard(),
            standard_id: self.standard_id().map(StandardBaud::as_u32),
            custom_rate: self.custom_rate(),
        }
    }
}

/// Serializable view of a resolution, used for CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub requested: u32,
    pub requested_as_index: bool,
    pub rate: u32,
    pub is_standard: bool,
    pub standard_id: Option<u32>,
    pub custom_rate: Option<u32>,
}

/// Match a rate against the standard table.
///
/// The closest standard identifier is accepted when its relative distance to
/// `rate` is at most [`BAUD_TOLERANCE`]; otherwise the rate is custom.
pub fn match_standard(rate: u32) -> BaudResolution {
    if rate == 0 {
        return BaudResolution::Custom(rate);
    }

    let closest = StandardBaud::ALL
        .iter()
        .copied()
        .min_by_key(|b| b.as_u32().abs_diff(rate))
        .unwrap_or(StandardBaud::Baud57600);

    let error = f64::from(closest.as_u32().abs_diff(rate)) / f64::from(rate);
    if error <= BAUD_TOLERANCE {
        BaudResolution::Standard(closest)
    } else {
        BaudResolution::Custom(rate)
    }
}

/// Actuator protocol family the link is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServoFamily {
    #[default]
    Unknown,
    /// Dynamixel AX series (protocol v1, 1 Mbps default).
    DynamixelAx,
    /// Dynamixel DX, RX, EX and MX series (protocol v1).
    DynamixelMx,
    /// Dynamixel XL-320 (protocol v2).
    DynamixelXl320,
    /// Dynamixel X series (protocol v2).
    DynamixelX,
    /// Dynamixel PRO (protocol v2).
    DynamixelPro,
    HerkuleX,
}

impl ServoFamily {
    pub fn is_dynamixel(self) -> bool {
        !matches!(self, ServoFamily::Unknown | ServoFamily::HerkuleX)
    }

    /// Baud rate used when the request is invalid for this family.
    pub fn default_baud(self) -> u32 {
        match self {
            ServoFamily::HerkuleX => HERKULEX_DEFAULT_BAUD,
            ServoFamily::DynamixelAx | ServoFamily::DynamixelXl320 => DYNAMIXEL_FAST_DEFAULT_BAUD,
            ServoFamily::DynamixelMx | ServoFamily::DynamixelX | ServoFamily::DynamixelPro => {
                DYNAMIXEL_DEFAULT_BAUD
            }
            ServoFamily::Unknown => GENERIC_DEFAULT_BAUD,
        }
    }

    /// Translate a baud index through this family's table.
    pub fn baud_from_index(self, index: u8) -> Option<u32> {
        match self {
            ServoFamily::DynamixelAx | ServoFamily::DynamixelMx => match index {
                0..=249 => Some(2_000_000 / (u32::from(index) + 1)),
                250 => Some(2_250_000),
                251 => Some(2_500_000),
                252 => Some(3_000_000),
                _ => None,
            },
            ServoFamily::DynamixelXl320 => DXL_XL320_BAUD_TABLE.get(usize::from(index)).copied(),
            ServoFamily::DynamixelX => DXL_X_BAUD_TABLE.get(usize::from(index)).copied(),
            ServoFamily::DynamixelPro => DXL_PRO_BAUD_TABLE.get(usize::from(index)).copied(),
            ServoFamily::HerkuleX => HKX_BAUD_TABLE
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, rate)| *rate),
            ServoFamily::Unknown => None,
        }
    }

    fn accepts_literal(self, rate: u32) -> bool {
        match self {
            ServoFamily::HerkuleX => (HERKULEX_BAUD_MIN..=HERKULEX_BAUD_MAX).contains(&rate),
            ServoFamily::Unknown => rate > 0,
            _ => (DYNAMIXEL_BAUD_MIN..=DYNAMIXEL_BAUD_MAX).contains(&rate),
        }
    }
}

impl FromStr for ServoFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" | "none" => Ok(ServoFamily::Unknown),
            "ax" => Ok(ServoFamily::DynamixelAx),
            "dx" | "rx" | "ex" | "mx" => Ok(ServoFamily::DynamixelMx),
            "xl320" | "xl-320" => Ok(ServoFamily::DynamixelXl320),
            "x" => Ok(ServoFamily::DynamixelX),
            "pro" => Ok(ServoFamily::DynamixelPro),
            "herkulex" | "hkx" => Ok(ServoFamily::HerkuleX),
            other => Err(format!("unknown servo family '{other}'")),
        }
    }
}

/// USB/TTL adapter in front of the bus, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerialAdapter {
    #[default]
    Unknown,
    Usb2Dynamixel,
    Usb2Ax,
    Zig100,
    Ftdi,
}

impl SerialAdapter {
    /// Highest rate the adapter chip can carry.
    pub fn max_baud(self) -> Option<u32> {
        match self {
            SerialAdapter::Usb2Dynamixel | SerialAdapter::Ftdi => Some(FTDI_MAX_BAUD),
            SerialAdapter::Usb2Ax => Some(USB2AX_MAX_BAUD),
            SerialAdapter::Zig100 => Some(ZIG100_MAX_BAUD),
            SerialAdapter::Unknown => None,
        }
    }
}

impl FromStr for SerialAdapter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" | "none" => Ok(SerialAdapter::Unknown),
            "usb2dynamixel" => Ok(SerialAdapter::Usb2Dynamixel),
            "usb2ax" => Ok(SerialAdapter::Usb2Ax),
            "zig100" | "zig110a" => Ok(SerialAdapter::Zig100),
            "ftdi" => Ok(SerialAdapter::Ftdi),
            other => Err(format!("unknown serial adapter '{other}'")),
        }
    }
}

/// Resolves baud requests for one servo family behind one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaudRateResolver {
    pub family: ServoFamily,
    pub adapter: SerialAdapter,
}

impl BaudRateResolver {
    pub fn new(family: ServoFamily, adapter: SerialAdapter) -> Self {
        BaudRateResolver { family, adapter }
    }

    /// Numeric rate a request stands for, after family validation and the
    /// adapter cap, before standard matching.
    pub fn target_rate(&self, requested: BaudRequest) -> u32 {
        let default = self.family.default_baud();

        let rate = match requested {
            BaudRequest::Index(index) => self.family.baud_from_index(index).unwrap_or_else(|| {
                warn!(
                    "Invalid baud index {index} for {:?} devices, using default baudrate of {default} bps",
                    self.family
                );
                default
            }),
            BaudRequest::Literal(rate) if self.family.accepts_literal(rate) => rate,
            BaudRequest::Literal(rate) => {
                warn!(
                    "Invalid baudrate {rate} bps for {:?} devices, using default baudrate of {default} bps",
                    self.family
                );
                default
            }
        };

        match self.adapter.max_baud() {
            Some(max) if rate > max => {
                warn!(
                    "Baudrate {rate} bps too high for {:?} adapter, clamping to {max} bps",
                    self.adapter
                );
                max
            }
            _ => rate,
        }
    }

    /// Resolve a request. Never fails: unusable requests fall back to the
    /// family default and unmatched rates become custom speeds.
    pub fn resolve(&self, requested: BaudRequest) -> BaudResolution {
        let resolution = match_standard(self.target_rate(requested));
        debug!("Baud request {requested:?} resolved to {resolution:?}");
        resolution
    }
}
