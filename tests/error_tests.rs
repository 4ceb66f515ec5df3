//! Unit tests for the `LinkError` enum and its associated `Display` trait implementation.

use servo_serial::error::LinkError;

/// Tests that the `DeviceNotFound` variant is correctly formatted.
#[test]
fn test_device_not_found_error() {
    let err = LinkError::DeviceNotFound("/dev/ttyUSB9".to_string());
    assert_eq!(err.to_string(), "Serial device not found: /dev/ttyUSB9");
}

/// Tests that the `LockHeld` variant is correctly formatted.
#[test]
fn test_lock_held_error() {
    let err = LinkError::LockHeld("/dev/ttyUSB0".to_string());
    assert_eq!(
        err.to_string(),
        "Serial device is locked by another instance: /dev/ttyUSB0"
    );
}

/// Tests that the `OpenFailed` variant is correctly formatted.
#[test]
fn test_open_failed_error() {
    let err = LinkError::OpenFailed {
        path: "/dev/ttyACM0".to_string(),
        reason: "Permission denied".to_string(),
    };
    assert_eq!(err.to_string(), "Failed to open /dev/ttyACM0: Permission denied");
}

/// Tests that the `Timeout` variant is correctly formatted.
#[test]
fn test_timeout_error() {
    let err = LinkError::Timeout {
        expected: 6,
        received: 2,
    };
    assert_eq!(err.to_string(), "Timeout: expected 6 bytes, received 2");
}

/// Tests that the `NotOpen` variant is correctly formatted.
#[test]
fn test_not_open_error() {
    assert_eq!(LinkError::NotOpen.to_string(), "Serial link is not open");
}

/// Tests that I/O errors convert with `?`.
#[test]
fn test_io_error_conversion() {
    fn fails() -> Result<(), LinkError> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(matches!(err, LinkError::Io(_)));
    assert_eq!(err.to_string(), "I/O error: gone");
}
