//! The serial module contains the transport components: device discovery,
//! baud resolution, device locking, timeout budgets and the link composing them.

pub mod baud;
pub mod link;
pub mod lock;
pub mod port;
pub mod scanner;
pub mod serial_mock;
pub mod timeout;

pub use baud::{
    match_standard, BaudRateResolver, BaudRequest, BaudResolution, ResolutionReport,
    SerialAdapter, ServoFamily, StandardBaud,
};
pub use link::{LinkConfig, LinkState, SerialLink};
pub use lock::{DeviceLock, FileLock, LockHandle};
pub use port::{NativeBackend, PortBackend, SerialDevice};
pub use scanner::{is_adapter_node, DeviceScanner, ScanReport};
pub use timeout::{TimeoutBudget, TimeoutPolicy};
