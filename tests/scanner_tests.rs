//! Adapter discovery over a fake device directory.

use std::fs;

use servo_serial::serial::DeviceScanner;

fn touch(dir: &std::path::Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), b"").unwrap();
    }
}

/// Tests that USB-serial and ACM nodes are listed and native UARTs are not.
#[test]
fn test_scan_filters_native_ports() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["ttyUSB0", "ttyACM1", "ttyS0", "ttyAMA0", "tty1", "null"]);

    let mut found = DeviceScanner::in_dir(dir.path()).scan();
    found.sort();

    let expected: Vec<String> = ["ttyACM1", "ttyUSB0"]
        .iter()
        .map(|n| dir.path().join(n).to_string_lossy().into_owned())
        .collect();
    assert_eq!(found, expected);
}

/// Tests that a host with only native UARTs reports nothing.
#[test]
fn test_scan_native_only_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["ttyS0", "ttyS1", "ttyS2"]);

    let scanner = DeviceScanner::in_dir(dir.path());
    assert!(scanner.scan().is_empty());
    assert_eq!(scanner.autoselect(), None);
}

/// Tests that autoselect picks one of the scanned adapters.
#[test]
fn test_autoselect_is_first_scanned() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["ttyUSB2", "ttyUSB5"]);

    let scanner = DeviceScanner::in_dir(dir.path());
    let scanned = scanner.scan();
    assert_eq!(scanner.autoselect().as_ref(), scanned.first());
    assert_eq!(scanned.len(), 2);
}

/// Tests that the probe keeps accessible nodes.
#[cfg(unix)]
#[test]
fn test_probe_keeps_accessible_nodes() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["ttyUSB0"]);

    let report = DeviceScanner::in_dir(dir.path()).with_probe(true).scan_report();
    assert_eq!(report.count(), 1);
    assert!(report.rejected.is_empty());
}

/// Tests the JSON shape of a scan report.
#[test]
fn test_report_serializes() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["ttyACM0"]);

    let report = DeviceScanner::in_dir(dir.path()).scan_report();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["ports"].as_array().unwrap().len(), 1);
    assert!(json["rejected"].as_array().unwrap().is_empty());
}
