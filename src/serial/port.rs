//! # Device Backends
//!
//! The OS boundary below [`SerialLink`](crate::serial::link::SerialLink): a
//! [`PortBackend`] opens device nodes and hands back [`SerialDevice`]s. The
//! native backend drives real hardware through the `serialport` crate; tests
//! plug in [`MockSerialPort`](crate::serial::serial_mock::MockSerialPort).

use std::io::{self, Read, Write};
use std::time::Duration;

use log::{debug, info, warn};
use serialport::SerialPort;

use crate::constants::BAUD_TOLERANCE;
use crate::error::LinkError;
use crate::serial::baud::BaudResolution;

/// An open, configured serial device.
pub trait SerialDevice: Send {
    /// Read whatever is available into `buf`, waiting at most `timeout` for
    /// the first byte. Times out with `io::ErrorKind::TimedOut`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Write all of `data`, failing if the driver does not accept it within `timeout`.
    fn write_all(&mut self, data: &[u8], timeout: Duration) -> io::Result<()>;

    /// Discard queued input and output.
    fn clear(&mut self) -> io::Result<()>;

    /// Rate currently applied by the driver.
    fn baud_rate(&self) -> io::Result<u32>;

    /// Enable the driver's low-latency mode. `Ok(false)` when the platform
    /// has no such mode.
    fn set_low_latency(&mut self, _latency_ms: u8) -> io::Result<bool> {
        Ok(false)
    }
}

/// Opens device nodes.
pub trait PortBackend {
    /// Whether the node exists at all.
    fn exists(&self, path: &str) -> bool;

    /// Open and configure `path` for raw 8N1 binary traffic at `baud`.
    fn open(&self, path: &str, baud: &BaudResolution) -> Result<Box<dyn SerialDevice>, LinkError>;
}

#[cfg(unix)]
type NativeHandle = serialport::TTYPort;
#[cfg(windows)]
type NativeHandle = serialport::COMPort;

/// Real serial hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl PortBackend for NativeBackend {
    fn exists(&self, path: &str) -> bool {
        if cfg!(unix) {
            std::path::Path::new(path).exists()
        } else {
            // COMx names are not filesystem paths
            true
        }
    }

    fn open(&self, path: &str, baud: &BaudResolution) -> Result<Box<dyn SerialDevice>, LinkError> {
        // serialport opens TTYs in raw mode (no line discipline translation)
        // and with TIOCEXCL set.
        let port = serialport::new(path, baud.rate())
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open_native()
            .map_err(|e| map_open_error(path, e))?;

        if let Some(rate) = baud.custom_rate() {
            verify_custom_speed(path, &port, rate)?;
        }

        info!("Opened {path} at {} bps", baud.rate());
        Ok(Box::new(NativePort {
            path: path.to_string(),
            port,
        }))
    }
}

fn map_open_error(path: &str, e: serialport::Error) -> LinkError {
    match e.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
            LinkError::DeviceNotFound(path.to_string())
        }
        _ => LinkError::open_failed(path, e),
    }
}

/// Non-standard rates go through the driver's custom speed path; make sure
/// the driver actually took it.
fn verify_custom_speed(path: &str, port: &NativeHandle, rate: u32) -> Result<(), LinkError> {
    match port.baud_rate() {
        Ok(applied) => {
            let error = f64::from(applied.abs_diff(rate)) / f64::from(rate.max(1));
            if error > BAUD_TOLERANCE {
                return Err(LinkError::open_failed(
                    path,
                    format!("custom speed {rate} bps not applied (driver reports {applied} bps)"),
                ));
            }
            debug!("Custom speed {rate} bps applied on {path} ({applied} bps)");
            Ok(())
        }
        Err(e) => {
            warn!("Cannot read back custom speed on {path}: {e}");
            Ok(())
        }
    }
}

struct NativePort {
    path: String,
    port: NativeHandle,
}

impl SerialDevice for NativePort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.set_timeout(timeout)?;
        Read::read(&mut self.port, buf)
    }

    fn write_all(&mut self, data: &[u8], timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout)?;
        Write::write_all(&mut self.port, data)
    }

    fn clear(&mut self) -> io::Result<()> {
        debug!("Discarding queued I/O on {}", self.path);
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::from)
    }

    fn baud_rate(&self) -> io::Result<u32> {
        self.port.baud_rate().map_err(io::Error::from)
    }

    #[cfg(target_os = "linux")]
    fn set_low_latency(&mut self, latency_ms: u8) -> io::Result<bool> {
        use std::os::unix::io::AsRawFd;

        low_latency::enable(self.port.as_raw_fd())?;
        if let Err(e) = low_latency::write_latency_timer(&self.path, latency_ms) {
            debug!("No latency timer for {}: {e}", self.path);
        }
        Ok(true)
    }
}

#[cfg(target_os = "linux")]
mod low_latency {
    use std::io;
    use std::os::unix::io::RawFd;
    use std::path::Path;

    const ASYNC_LOW_LATENCY: libc::c_int = 1 << 13;

    /// `struct serial_struct` from <linux/serial.h>.
    #[repr(C)]
    #[allow(dead_code)]
    struct SerialStruct {
        kind: libc::c_int,
        line: libc::c_int,
        port: libc::c_uint,
        irq: libc::c_int,
        flags: libc::c_int,
        xmit_fifo_size: libc::c_int,
        custom_divisor: libc::c_int,
        baud_base: libc::c_int,
        close_delay: libc::c_ushort,
        io_type: libc::c_char,
        reserved_char: [libc::c_char; 1],
        hub6: libc::c_int,
        closing_wait: libc::c_ushort,
        closing_wait2: libc::c_ushort,
        iomem_base: *mut libc::c_uchar,
        iomem_reg_shift: libc::c_ushort,
        port_high: libc::c_uint,
        iomap_base: libc::c_ulong,
    }

    /// Set ASYNC_LOW_LATENCY on the tty. Usually needs elevated privileges.
    pub fn enable(fd: RawFd) -> io::Result<()> {
        // SAFETY: serial_struct is plain old data; zero is a valid bit pattern.
        let mut serial: SerialStruct = unsafe { std::mem::zeroed() };
        // SAFETY: fd is an open tty and `serial` matches the kernel layout.
        if unsafe { libc::ioctl(fd, libc::TIOCGSERIAL, &mut serial as *mut SerialStruct) } < 0 {
            return Err(io::Error::last_os_error());
        }
        serial.flags |= ASYNC_LOW_LATENCY;
        // SAFETY: as above.
        if unsafe { libc::ioctl(fd, libc::TIOCSSERIAL, &serial as *const SerialStruct) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// FTDI adapters expose their USB latency timer in sysfs.
    pub fn write_latency_timer(device_path: &str, latency_ms: u8) -> io::Result<()> {
        let name = Path::new(device_path)
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no device name"))?;
        let attr = Path::new("/sys/bus/usb-serial/devices")
            .join(name)
            .join("latency_timer");
        std::fs::write(attr, format!("{latency_ms}\n"))
    }
}
