//! Mock serial port implementation for testing
//!
//! This module provides a mock backend that can be used to test the serial
//! link without requiring actual hardware. Every clone shares the same
//! simulated device, so a test can keep one clone to inspect traffic while
//! the link owns another.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::LinkError;
use crate::serial::baud::BaudResolution;
use crate::serial::port::{PortBackend, SerialDevice};

#[derive(Default)]
struct MockState {
    /// Data written to the port (outgoing)
    tx: Vec<u8>,
    /// Data to be read from the port (incoming)
    rx: VecDeque<u8>,
    /// Error returned by the next read or write
    next_error: Option<io::Error>,
    /// Failure returned by the next open
    open_error: Option<String>,
    /// Device node is absent
    missing: bool,
    opens: usize,
    live_handles: usize,
    clears: usize,
    applied: Option<BaudResolution>,
    low_latency_supported: bool,
    low_latency: bool,
    /// Time each write takes
    write_delay: Duration,
}

/// Mock serial device and backend.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A test that panicked mid-operation must not poison the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.state().rx.extend(data);
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.state().tx.clone()
    }

    /// Bytes queued for reading that nobody consumed yet
    pub fn pending_rx(&self) -> usize {
        self.state().rx.len()
    }

    /// Set an error to be returned on the next read or write
    pub fn set_next_error(&self, error: io::Error) {
        self.state().next_error = Some(error);
    }

    /// Make the next open fail with a configuration error
    pub fn fail_next_open(&self, reason: &str) {
        self.state().open_error = Some(reason.to_string());
    }

    /// Simulate an unplugged device
    pub fn set_missing(&self, missing: bool) {
        self.state().missing = missing;
    }

    /// Make every write take `delay`, like a slow link draining its queue
    pub fn set_write_delay(&self, delay: Duration) {
        self.state().write_delay = delay;
    }

    /// Pretend the driver offers a low-latency mode
    pub fn support_low_latency(&self, supported: bool) {
        self.state().low_latency_supported = supported;
    }

    pub fn low_latency_enabled(&self) -> bool {
        self.state().low_latency
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    /// Device handles currently alive
    pub fn live_handles(&self) -> usize {
        self.state().live_handles
    }

    /// Number of flushes performed
    pub fn clear_count(&self) -> usize {
        self.state().clears
    }

    /// Speed configuration used by the last open
    pub fn applied_baud(&self) -> Option<BaudResolution> {
        self.state().applied
    }
}

impl PortBackend for MockSerialPort {
    fn exists(&self, _path: &str) -> bool {
        !self.state().missing
    }

    fn open(&self, path: &str, baud: &BaudResolution) -> Result<Box<dyn SerialDevice>, LinkError> {
        let mut state = self.state();
        if state.missing {
            return Err(LinkError::DeviceNotFound(path.to_string()));
        }
        if let Some(reason) = state.open_error.take() {
            return Err(LinkError::open_failed(path, reason));
        }
        state.opens += 1;
        state.live_handles += 1;
        state.applied = Some(*baud);
        state.low_latency = false;
        drop(state);

        Ok(Box::new(MockHandle { port: self.clone() }))
    }
}

/// One open handle on the mock device.
struct MockHandle {
    port: MockSerialPort,
}

impl MockHandle {
    fn take_available(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut state = self.port.state();
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        let available = state.rx.len().min(buf.len());
        if available == 0 {
            return Ok(None);
        }
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..available)) {
            *slot = byte;
        }
        Ok(Some(available))
    }
}

impl SerialDevice for MockHandle {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if let Some(n) = self.take_available(buf)? {
            return Ok(n);
        }
        // Nothing queued: wait out the timeout like a silent device would,
        // then take whatever arrived meanwhile.
        std::thread::sleep(timeout);
        match self.take_available(buf)? {
            Some(n) => Ok(n),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out")),
        }
    }

    fn write_all(&mut self, data: &[u8], _timeout: Duration) -> io::Result<()> {
        let delay = {
            let mut state = self.port.state();
            if let Some(error) = state.next_error.take() {
                return Err(error);
            }
            state.tx.extend_from_slice(data);
            state.write_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        let mut state = self.port.state();
        state.rx.clear();
        state.clears += 1;
        Ok(())
    }

    fn baud_rate(&self) -> io::Result<u32> {
        self.port
            .state()
            .applied
            .map(|b| b.rate())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not configured"))
    }

    fn set_low_latency(&mut self, _latency_ms: u8) -> io::Result<bool> {
        let mut state = self.port.state();
        state.low_latency = state.low_latency_supported;
        Ok(state.low_latency_supported)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let mut state = self.port.state();
        state.live_handles = state.live_handles.saturating_sub(1);
    }
}
