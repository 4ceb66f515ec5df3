//! # Serial Link
//!
//! [`SerialLink`] is what a servo protocol stack talks to: it owns one device
//! node, takes the device lock before touching the node, applies the resolved
//! baud rate, and bounds every transfer by a timeout budget.
//!
//! ```rust,no_run
//! use servo_serial::serial::{BaudRequest, LinkConfig, SerialLink, ServoFamily};
//!
//! let config = LinkConfig::new("auto", BaudRequest::Index(1)).with_family(ServoFamily::DynamixelMx);
//! let mut link = SerialLink::new(config);
//! link.open()?;
//!
//! let ping = [0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB];
//! let mut status = [0u8; 6];
//! link.set_timeout_packet(status.len());
//! link.tx(&ping)?;
//! let n = link.rx(&mut status)?;
//! println!("{n} bytes back, timed out: {}", link.check_timeout());
//! link.close();
//! # Ok::<(), servo_serial::LinkError>(())
//! ```

use std::io;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};

use crate::constants::{AUTO_DEVICE, LATENCY_TIME_DEFAULT_MS};
use crate::error::LinkError;
use crate::logging::log_frame_hex;
use crate::serial::baud::{BaudRateResolver, BaudRequest, BaudResolution, SerialAdapter, ServoFamily};
use crate::serial::lock::{DeviceLock, FileLock, LockHandle};
use crate::serial::port::{NativeBackend, PortBackend, SerialDevice};
use crate::serial::scanner::DeviceScanner;
use crate::serial::timeout::{TimeoutBudget, TimeoutPolicy};

/// Construction parameters for a link. Lives in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Device node, or "auto" for the first scanned adapter.
    pub device: String,
    pub baud: BaudRequest,
    pub family: ServoFamily,
    pub adapter: SerialAdapter,
    /// Adapter latency timer in milliseconds, `[1, 128]`.
    pub latency_ms: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            device: AUTO_DEVICE.to_string(),
            baud: BaudRequest::Literal(ServoFamily::Unknown.default_baud()),
            family: ServoFamily::Unknown,
            adapter: SerialAdapter::Unknown,
            latency_ms: LATENCY_TIME_DEFAULT_MS,
        }
    }
}

impl LinkConfig {
    pub fn new(device: impl Into<String>, baud: impl Into<BaudRequest>) -> Self {
        LinkConfig {
            device: device.into(),
            baud: baud.into(),
            ..Default::default()
        }
    }

    pub fn with_family(mut self, family: ServoFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_adapter(mut self, adapter: SerialAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_latency(mut self, latency_ms: u8) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn resolver(&self) -> BaudRateResolver {
        BaudRateResolver::new(self.family, self.adapter)
    }

    /// Concrete device path, running the scanner for "auto".
    pub fn resolve_device(&self, scanner: &DeviceScanner) -> Option<String> {
        if self.device == AUTO_DEVICE {
            let selected = scanner.autoselect();
            match &selected {
                Some(path) => info!("Auto-selected serial port {path}"),
                None => warn!("Auto-selection found no serial port"),
            }
            selected
        } else {
            Some(self.device.clone())
        }
    }
}

/// Link lifecycle. `Opening` is only ever seen from inside [`SerialLink::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Opening,
    Open,
}

/// One serial device, exclusively held while open.
pub struct SerialLink<B: PortBackend = NativeBackend, L: DeviceLock = FileLock> {
    path: Option<String>,
    request: BaudRequest,
    resolver: BaudRateResolver,
    resolution: Option<BaudResolution>,
    policy: TimeoutPolicy,
    budget: Option<TimeoutBudget>,
    state: LinkState,
    backend: B,
    locker: L,
    lock: Option<LockHandle>,
    port: Option<Box<dyn SerialDevice>>,
}

impl SerialLink {
    /// Link on real hardware, locking in the OS temp directory.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_parts(config, NativeBackend, FileLock::default())
    }
}

impl<B: PortBackend, L: DeviceLock> SerialLink<B, L> {
    pub fn with_parts(config: LinkConfig, backend: B, locker: L) -> Self {
        let path = config.resolve_device(&DeviceScanner::default());
        Self::bound(path, &config, backend, locker)
    }

    /// Like [`with_parts`](Self::with_parts), resolving "auto" with a
    /// caller-provided scanner.
    pub fn with_scanner(config: LinkConfig, scanner: &DeviceScanner, backend: B, locker: L) -> Self {
        let path = config.resolve_device(scanner);
        Self::bound(path, &config, backend, locker)
    }

    fn bound(path: Option<String>, config: &LinkConfig, backend: B, locker: L) -> Self {
        let policy = TimeoutPolicy::with_latency(config.latency_ms).unwrap_or_else(|| {
            warn!(
                "Invalid latency value {} ms, using default of {LATENCY_TIME_DEFAULT_MS} ms",
                config.latency_ms
            );
            TimeoutPolicy::default()
        });

        SerialLink {
            path,
            request: config.baud,
            resolver: config.resolver(),
            resolution: None,
            policy,
            budget: None,
            state: LinkState::Closed,
            backend,
            locker,
            lock: None,
            port: None,
        }
    }

    /// Lock, open and configure the device. A no-op on an open link.
    ///
    /// On failure every partially acquired resource is released and the
    /// link stays closed.
    pub fn open(&mut self) -> Result<(), LinkError> {
        if self.state == LinkState::Open {
            return Ok(());
        }

        let path = self
            .path
            .clone()
            .ok_or_else(|| LinkError::DeviceNotFound(AUTO_DEVICE.to_string()))?;
        if !self.backend.exists(&path) {
            warn!("Serial device {path} does not exist");
            return Err(LinkError::DeviceNotFound(path));
        }

        let resolution = self.resolver.resolve(self.request);

        self.state = LinkState::Opening;
        let result = self.open_locked(&path, resolution);
        self.state = if result.is_ok() {
            LinkState::Open
        } else {
            LinkState::Closed
        };

        match &result {
            Ok(()) => info!(
                "Serial link {path} open at {} bps ({})",
                resolution.rate(),
                if resolution.is_standard() { "standard" } else { "custom speed" }
            ),
            Err(e) => warn!("Unable to open serial link {path}: {e}"),
        }
        result
    }

    fn open_locked(&mut self, path: &str, resolution: BaudResolution) -> Result<(), LinkError> {
        let mut lock = self.locker.acquire(path)?;

        match self.backend.open(path, &resolution) {
            Ok(port) => {
                self.port = Some(port);
                self.lock = Some(lock);
                self.resolution = Some(resolution);
                self.budget = None;
                Ok(())
            }
            Err(e) => {
                self.locker.release(&mut lock);
                Err(e)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Write all of `data`. Returns the number of bytes written.
    pub fn tx(&mut self, data: &[u8]) -> Result<usize, LinkError> {
        let budget = self.current_budget(data.len());
        let device = self.path.as_deref().unwrap_or_default();
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;

        log_frame_hex("tx", device, data);
        port.write_all(data, budget.remaining())?;
        Ok(data.len())
    }

    /// Fill `buf` until it is full or the timeout budget runs out.
    ///
    /// A short read is not an error; the count of bytes received is returned.
    pub fn rx(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let budget = self.current_budget(buf.len());
        let device = self.path.as_deref().unwrap_or_default();
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;

        let mut received = 0;
        while received < buf.len() {
            match port.read(&mut buf[received..], budget.remaining()) {
                Ok(n) => received += n,
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    break
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(LinkError::Io(e)),
            }
            if budget.check_timeout() {
                break;
            }
        }

        if received < buf.len() {
            debug!(
                "rx {device}: {received}/{} bytes within {:?}",
                buf.len(),
                budget.budget()
            );
        }
        log_frame_hex("rx", device, &buf[..received]);
        Ok(received)
    }

    /// [`rx`](Self::rx) that turns a short read into [`LinkError::Timeout`].
    pub fn rx_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError> {
        let received = self.rx(buf)?;
        if received < buf.len() {
            return Err(LinkError::Timeout {
                expected: buf.len(),
                received,
            });
        }
        Ok(())
    }

    /// Send a request and collect its answer.
    ///
    /// The answer's budget is armed once the request is written: a fixed
    /// `timeout_ms` when given, otherwise one sized for `answer`. Returns the
    /// number of answer bytes received, as [`rx`](Self::rx) does.
    pub fn exchange(
        &mut self,
        request: &[u8],
        answer: &mut [u8],
        timeout_ms: Option<f64>,
    ) -> Result<usize, LinkError> {
        self.tx(request)?;
        match timeout_ms {
            Some(ms) => self.set_timeout_ms(ms),
            None => self.set_timeout_packet(answer.len()),
        }
        if answer.is_empty() {
            return Ok(0);
        }
        self.rx(answer)
    }

    /// Discard unread input and unsent output, to resynchronize after a
    /// framing error.
    pub fn flush(&mut self) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        port.clear()?;
        Ok(())
    }

    /// Release the device handle, then the lock. Never fails; safe to call
    /// any number of times.
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            info!(
                "Closed serial link {}",
                self.path.as_deref().unwrap_or_default()
            );
        }
        if let Some(mut lock) = self.lock.take() {
            self.locker.release(&mut lock);
        }
        self.budget = None;
        self.state = LinkState::Closed;
    }

    /// Enable the driver's low-latency mode where the platform has one.
    /// Returns false when unavailable, which only costs latency.
    pub fn switch_high_speed(&mut self) -> bool {
        let latency_ms = self.policy.latency_ms();
        let Some(port) = self.port.as_mut() else {
            return false;
        };
        match port.set_low_latency(latency_ms) {
            Ok(true) => {
                info!("Low latency mode enabled ({latency_ms} ms latency timer)");
                true
            }
            Ok(false) => {
                debug!("No low latency mode on this platform");
                false
            }
            Err(e) => {
                warn!("Unable to enable low latency mode: {e}");
                false
            }
        }
    }

    /// Set the adapter latency timer used in timeout budgets, `[1, 128]` ms.
    pub fn set_latency(&mut self, latency_ms: u8) {
        match TimeoutPolicy::with_latency(latency_ms) {
            Some(policy) => self.policy = policy,
            None => warn!("Invalid latency value {latency_ms} ms, not in [1;128] range"),
        }
    }

    /// Arm a budget sized for a packet of `packet_len` bytes.
    pub fn set_timeout_packet(&mut self, packet_len: usize) {
        let budget = self.policy.timeout_for(self.baud_rate(), packet_len);
        self.budget = Some(TimeoutBudget::start(budget));
    }

    /// Arm a fixed budget.
    pub fn set_timeout_ms(&mut self, msec: f64) {
        self.budget = Some(TimeoutBudget::start(TimeoutPolicy::fixed(msec)));
    }

    /// Disarm the budget; transfers fall back to one sized for themselves.
    pub fn clear_timeout(&mut self) {
        self.budget = None;
    }

    /// Has the armed budget run out? False when nothing is armed.
    pub fn check_timeout(&self) -> bool {
        self.budget.is_some_and(|b| b.check_timeout())
    }

    pub fn timeout_budget(&self) -> Option<Duration> {
        self.budget.map(|b| b.budget())
    }

    fn current_budget(&self, len: usize) -> TimeoutBudget {
        self.budget.unwrap_or_else(|| {
            TimeoutBudget::start(self.policy.timeout_for(self.baud_rate(), len))
        })
    }

    /// Effective baud rate: the applied one when open, otherwise what the
    /// request resolves to.
    pub fn baud_rate(&self) -> u32 {
        self.resolution
            .unwrap_or_else(|| self.resolver.resolve(self.request))
            .rate()
    }

    pub fn resolution(&self) -> Option<BaudResolution> {
        self.resolution
    }

    pub fn latency_ms(&self) -> u8 {
        self.policy.latency_ms()
    }

    /// Full device path, None when "auto" found nothing.
    pub fn device_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Node name without its directory, e.g. "ttyUSB0".
    pub fn device_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .and_then(|n| n.to_str())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn locker(&self) -> &L {
        &self.locker
    }
}

impl<B: PortBackend, L: DeviceLock> Drop for SerialLink<B, L> {
    fn drop(&mut self) {
        self.close();
    }
}
