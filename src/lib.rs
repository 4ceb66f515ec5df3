//! # servo-serial - Serial Transport for Smart Servo Protocol Stacks
//!
//! The servo-serial crate is the layer between a servo command/response
//! protocol (Dynamixel, HerkuleX, ...) and the USB-to-serial or TTL adapter the
//! servos hang off. The protocol layer hands it byte frames; this crate makes
//! sure they reach exactly one device, at the right speed, without ever
//! blocking longer than the frame can take.
//!
//! ## Features
//!
//! - Discover USB-serial and ACM adapters, skipping always-present native UARTs
//! - Resolve baud rates and protocol baud indexes, with a custom speed fallback
//! - Lock devices across processes, with automatic release when a process dies
//! - Compute receive timeouts from baud rate and packet size
//! - Deadline-bounded transmit/receive on a raw, unmangled binary link
//!
//! ## Usage
//!
//! ```rust,no_run
//! use servo_serial::{init_logger, BaudRequest, LinkConfig, SerialLink};
//!
//! init_logger();
//! let mut link = SerialLink::new(LinkConfig::new("/dev/ttyUSB0", BaudRequest::Literal(1_000_000)));
//! link.open()?;
//! link.tx(&[0xFF, 0xFF, 0xFE, 0x02, 0x01, 0xFE])?;
//! link.close();
//! # Ok::<(), servo_serial::LinkError>(())
//! ```

pub mod constants;
pub mod error;
pub mod logging;
pub mod serial;
pub mod util;

pub use crate::error::LinkError;
pub use crate::logging::{init_logger, log_info};

pub use serial::{
    BaudRateResolver, BaudRequest, BaudResolution, DeviceLock, DeviceScanner, FileLock,
    LinkConfig, LinkState, SerialAdapter, SerialLink, ServoFamily, StandardBaud, TimeoutPolicy,
};

/// Scan the host for serial adapters, in discovery order.
pub fn scan_serial_ports() -> Vec<String> {
    DeviceScanner::default().scan()
}

/// First adapter found on the host, or None.
pub fn autoselect_serial_port() -> Option<String> {
    DeviceScanner::default().autoselect()
}
