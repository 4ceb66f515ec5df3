//! Unit tests for the logging functionality in the `servo-serial` crate.

use servo_serial::logging::{init_logger, log_debug, log_error, log_frame_hex, log_info, log_warn};

/// Tests that the logging helpers do not panic, before or after init.
#[test]
fn test_logging() {
    log_error("This is an error message");
    log_warn("This is a warning message");
    log_info("This is an info message");
    log_debug("This is a debug message");
    log_frame_hex("tx", "/dev/ttyUSB0", &[0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
}

/// Tests that the logger can be initialized repeatedly.
#[test]
fn test_init_logger() {
    init_logger();
    init_logger();
    log_frame_hex("rx", "/dev/ttyUSB0", &[]);
}
