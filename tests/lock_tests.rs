//! Cross-instance behaviour of the device lock. Every `FileLock` opens its own
//! lock file descriptor, so two of them in one process behave like two
//! independent framework instances.

use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Barrier};
use std::thread;

use servo_serial::serial::{DeviceLock, FileLock};
use servo_serial::LinkError;

const DEVICE: &str = "/dev/ttyUSB0";

/// Set in the child process spawned by `test_lock_reclaimed_after_owner_exits`.
const CHILD_LOCK_DIR: &str = "SERVO_SERIAL_CHILD_LOCK_DIR";

#[test]
fn test_concurrent_acquire_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let lock = FileLock::new(dir.path());
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                lock.acquire(DEVICE)
            })
        })
        .collect();

    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let held = results
        .iter()
        .filter(|r| matches!(r, Err(LinkError::LockHeld(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(held, 1);
}

#[test]
fn test_second_instance_gets_lock_held() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileLock::new(dir.path());
    let second = FileLock::new(dir.path());

    let handle = first.acquire(DEVICE).unwrap();
    match second.acquire(DEVICE) {
        Err(LinkError::LockHeld(path)) => assert_eq!(path, DEVICE),
        other => panic!("expected LockHeld, got {other:?}"),
    }
    drop(handle);
}

#[test]
fn test_release_then_acquire_from_other_instance() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileLock::new(dir.path());
    let second = FileLock::new(dir.path());

    let mut handle = first.acquire(DEVICE).unwrap();
    first.release(&mut handle);

    let taken = second.acquire(DEVICE).unwrap();
    assert!(taken.is_live());
}

#[test]
fn test_dropped_handle_releases() {
    let dir = tempfile::tempdir().unwrap();
    let lock = FileLock::new(dir.path());

    {
        let _handle = lock.acquire(DEVICE).unwrap();
        assert!(lock.is_locked(DEVICE));
    }
    assert!(!lock.is_locked(DEVICE));
}

#[test]
fn test_is_locked_probe_takes_no_claim() {
    let dir = tempfile::tempdir().unwrap();
    let owner = FileLock::new(dir.path());
    let observer = FileLock::new(dir.path());

    assert!(!observer.is_locked(DEVICE));

    let handle = owner.acquire(DEVICE).unwrap();
    assert!(observer.is_locked(DEVICE));
    assert!(observer.is_locked(DEVICE));
    drop(handle);

    // Probing a free device must not leave it locked.
    assert!(!observer.is_locked(DEVICE));
    let again = owner.acquire(DEVICE).unwrap();
    assert!(again.is_live());
}

#[test]
fn test_release_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let lock = FileLock::new(dir.path());
    let other = FileLock::new(dir.path());

    let mut handle = lock.acquire(DEVICE).unwrap();
    lock.release(&mut handle);
    lock.release(&mut handle);
    // Releasing through another instance is a no-op too.
    other.release(&mut handle);
    assert!(!handle.is_live());
    assert!(!lock.is_locked(DEVICE));
}

#[test]
fn test_devices_lock_independently() {
    let dir = tempfile::tempdir().unwrap();
    let lock = FileLock::new(dir.path());

    let a = lock.acquire("/dev/ttyUSB0").unwrap();
    let b = lock.acquire("/dev/ttyACM0").unwrap();
    assert_ne!(a.lock_path(), b.lock_path());
}

#[test]
fn test_stale_artifact_does_not_block() {
    // A lock file left behind by a crashed process holds no OS lock.
    let dir = tempfile::tempdir().unwrap();
    let lock = FileLock::new(dir.path());
    std::fs::write(lock.lock_path_for(DEVICE), "     99999\n").unwrap();

    assert!(!lock.is_locked(DEVICE));
    let handle = lock.acquire(DEVICE).unwrap();
    assert!(handle.is_live());
}

#[test]
fn test_release_from_other_lock_dir_is_ignored() {
    let owner_dir = tempfile::tempdir().unwrap();
    let other_dir = tempfile::tempdir().unwrap();
    let owner = FileLock::new(owner_dir.path());
    let stranger = FileLock::new(other_dir.path());

    let mut handle = owner.acquire(DEVICE).unwrap();
    stranger.release(&mut handle);

    assert!(handle.is_live());
    assert!(owner.is_locked(DEVICE));
}

#[test]
fn test_release_from_other_instance_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let owner = FileLock::new(dir.path());
    let other = FileLock::new(dir.path());

    let mut handle = owner.acquire(DEVICE).unwrap();
    other.release(&mut handle);
    assert!(handle.is_live());
    assert!(matches!(other.acquire(DEVICE), Err(LinkError::LockHeld(_))));

    owner.release(&mut handle);
    assert!(other.acquire(DEVICE).is_ok());
}

/// Takes the lock, checks it is held, and exits without releasing it.
fn hold_lock_and_exit(lock_dir: &Path) -> ! {
    let handle = FileLock::new(lock_dir)
        .acquire(DEVICE)
        .expect("child acquires the lock");
    let held = FileLock::new(lock_dir).is_locked(DEVICE);
    std::mem::forget(handle);
    std::process::exit(if held { 0 } else { 3 });
}

#[test]
fn test_lock_reclaimed_after_owner_exits() {
    if let Some(dir) = std::env::var_os(CHILD_LOCK_DIR) {
        hold_lock_and_exit(Path::new(&dir));
    }

    let dir = tempfile::tempdir().unwrap();
    let exe = std::env::current_exe().unwrap();
    let mut child = Command::new(exe)
        .args(["test_lock_reclaimed_after_owner_exits", "--exact", "--test-threads=1"])
        .env(CHILD_LOCK_DIR, dir.path())
        .spawn()
        .unwrap();
    let child_pid = child.id();
    let status = child.wait().unwrap();
    assert!(status.success(), "child exited with {status}");

    let lock = FileLock::new(dir.path());
    let content = std::fs::read_to_string(lock.lock_path_for(DEVICE)).unwrap();
    assert_eq!(content.trim().parse::<u32>().unwrap(), child_pid);

    assert!(!lock.is_locked(DEVICE));
    let handle = lock.acquire(DEVICE).unwrap();
    assert!(handle.is_live());
}
