use log::{debug, error, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// The filter is read from `RUST_LOG`. Calling this more than once is harmless,
/// later calls leave the first logger in place.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}

/// Logs a frame as hex at debug level, skipping the formatting work when
/// debug output is disabled.
pub fn log_frame_hex(direction: &str, device: &str, data: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!(
            "{direction} {device} [{}]: {}",
            data.len(),
            crate::util::hex::format_hex_compact(data)
        );
    }
}
