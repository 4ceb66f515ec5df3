//! # Serial Device Discovery
//!
//! Lists the USB-serial and ACM adapters a servo bus can hang off. Native
//! UARTs (`/dev/ttyS*`) are left out on purpose: they are always present,
//! whether or not anything is wired to them, so "auto" selection would pick
//! them up as false positives.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use serialport::SerialPortType;

/// Name prefixes of USB-serial converters (FTDI, CP210x, CH34x, ...).
const USB_SERIAL_PREFIXES: [&str; 2] = ["ttyUSB", "cu.usbserial"];

/// Name prefixes of CDC-ACM virtual serial ports (USB2AX, OpenCM, ...).
const ACM_PREFIXES: [&str; 2] = ["ttyACM", "cu.usbmodem"];

/// Always-resident native serial ports.
const NATIVE_PREFIXES: [&str; 2] = ["ttyS", "ttyAMA"];

fn node_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Whether a node name belongs to one of the adapter families.
pub fn is_adapter_node(path: &str) -> bool {
    let name = node_name(path);
    USB_SERIAL_PREFIXES
        .iter()
        .chain(ACM_PREFIXES.iter())
        .any(|prefix| name.starts_with(prefix))
}

/// Whether a node name is a native UART.
pub fn is_native_node(path: &str) -> bool {
    let name = node_name(path);
    NATIVE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Usable adapters, in discovery order.
    pub ports: Vec<String>,
    /// Adapters that were found but failed the accessibility probe.
    pub rejected: Vec<String>,
}

impl ScanReport {
    pub fn count(&self) -> usize {
        self.ports.len()
    }
}

/// Enumerates adapter-style serial nodes.
#[derive(Debug, Clone)]
pub struct DeviceScanner {
    /// Ask the OS enumeration (`serialport::available_ports`).
    enumerate: bool,
    /// Directory listed for nodes the enumeration missed.
    dev_dir: Option<PathBuf>,
    /// Drop nodes the current user cannot read and write.
    probe: bool,
}

impl Default for DeviceScanner {
    fn default() -> Self {
        DeviceScanner {
            enumerate: true,
            dev_dir: cfg!(target_os = "linux").then(|| PathBuf::from("/dev")),
            probe: true,
        }
    }
}

impl DeviceScanner {
    /// Scan only the given directory, without OS enumeration or probing.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        DeviceScanner {
            enumerate: false,
            dev_dir: Some(dir.into()),
            probe: false,
        }
    }

    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe = probe;
        self
    }

    /// Adapter nodes in discovery order. Empty when nothing is attached.
    pub fn scan(&self) -> Vec<String> {
        self.scan_report().ports
    }

    /// First adapter found, the target of "auto" device selection.
    pub fn autoselect(&self) -> Option<String> {
        self.scan().into_iter().next()
    }

    pub fn scan_report(&self) -> ScanReport {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        if self.enumerate {
            match serialport::available_ports() {
                Ok(ports) => {
                    for info in ports {
                        let usb = matches!(info.port_type, SerialPortType::UsbPort(_));
                        let name = info.port_name;
                        if (is_adapter_node(&name) || (usb && !is_native_node(&name)))
                            && seen.insert(name.clone())
                        {
                            candidates.push(name);
                        }
                    }
                }
                Err(e) => debug!("Serial port enumeration failed: {e}"),
            }
        }

        if let Some(dir) = &self.dev_dir {
            match std::fs::read_dir(dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let Some(fname) = entry.file_name().to_str().map(str::to_string) else {
                            continue;
                        };
                        if !is_adapter_node(&fname) {
                            continue;
                        }
                        let full = dir.join(&fname).to_string_lossy().into_owned();
                        if seen.insert(full.clone()) {
                            candidates.push(full);
                        }
                    }
                }
                Err(e) => debug!("Cannot list {}: {e}", dir.display()),
            }
        }

        let mut report = ScanReport::default();
        for path in candidates {
            if !self.probe || is_accessible(Path::new(&path)) {
                report.ports.push(path);
            } else {
                debug!("Skipping inaccessible serial port {path}");
                report.rejected.push(path);
            }
        }

        if report.ports.is_empty() {
            warn!("No serial ports found during scan");
        } else {
            info!("Found {} serial port(s): {:?}", report.count(), report.ports);
        }
        report
    }
}

/// Non-destructive accessibility check. Opening a tty could drop DTR on
/// close and reset the attached board, so only permissions are checked.
#[cfg(unix)]
fn is_accessible(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_accessible(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_families() {
        assert!(is_adapter_node("/dev/ttyUSB0"));
        assert!(is_adapter_node("/dev/ttyACM12"));
        assert!(is_adapter_node("/dev/cu.usbserial-A9M9DV3R"));
        assert!(is_adapter_node("/dev/cu.usbmodem14101"));
        assert!(!is_adapter_node("/dev/ttyS0"));
        assert!(!is_adapter_node("/dev/tty0"));
        assert!(!is_adapter_node("COM3"));
    }

    #[test]
    fn test_native_nodes() {
        assert!(is_native_node("/dev/ttyS1"));
        assert!(is_native_node("/dev/ttyAMA0"));
        assert!(!is_native_node("/dev/ttyUSB1"));
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let scanner = DeviceScanner::in_dir("/nonexistent/servo-serial-dev");
        assert!(scanner.scan().is_empty());
        assert_eq!(scanner.autoselect(), None);
    }
}
