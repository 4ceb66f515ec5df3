//! # Device Locking
//!
//! Several processes may race to open the same servo bus. Exclusivity is
//! coordinated through an advisory lock on a small artifact file whose name is
//! derived from the device (`LCK..ttyUSB0`), not on the device node itself,
//! so the mechanism works wherever a regular file can be locked.
//!
//! The lock primitive is tied to the lifetime of the open file: `flock(2)` on
//! Unix, an exclusive share-mode handle on Windows. If the owning process dies
//! the OS drops the lock, so a crash never leaves the device unusable.
//!
//! Other strategies (lock manager daemons, shared marker directories) plug in
//! by implementing [`DeviceLock`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};

use crate::constants::LOCK_FILE_PREFIX;
use crate::error::LinkError;

static NEXT_LOCKER_ID: AtomicU64 = AtomicU64::new(1);

/// An exclusive claim on one device path.
///
/// Dropping the handle releases the claim.
#[derive(Debug)]
pub struct LockHandle {
    device_path: String,
    lock_path: PathBuf,
    /// Id of the locker that issued the claim.
    owner: u64,
    file: Option<File>,
}

impl LockHandle {
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn is_live(&self) -> bool {
        self.file.is_some()
    }

    /// Give the claim up. Returns false if it was already released.
    fn unlock(&mut self) -> bool {
        match self.file.take() {
            Some(file) => {
                if let Err(e) = sys::unlock(&file) {
                    // Closing the descriptor below releases it anyway.
                    debug!("Explicit unlock of {} failed: {e}", self.lock_path.display());
                }
                drop(file);
                debug!("Released lock {}", self.lock_path.display());
                true
            }
            None => false,
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// Capability interface for cross-process device exclusivity.
pub trait DeviceLock {
    /// Take the exclusive claim on `device_path`, failing with
    /// [`LinkError::LockHeld`] when another instance owns it.
    fn acquire(&self, device_path: &str) -> Result<LockHandle, LinkError>;

    /// Non-blocking probe. Leaves no claim behind.
    fn is_locked(&self, device_path: &str) -> bool;

    /// Release a claim taken through this locker. Idempotent. Handles
    /// issued by another locker are left untouched.
    fn release(&self, handle: &mut LockHandle);
}

/// Process-lifetime file lock stored in a lock directory.
///
/// Each instance only releases the handles it issued. Clones share that
/// ownership.
#[derive(Debug, Clone)]
pub struct FileLock {
    lock_dir: PathBuf,
    id: u64,
}

impl Default for FileLock {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl FileLock {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        FileLock {
            lock_dir: lock_dir.into(),
            id: NEXT_LOCKER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Lock artifact for a device. Symlinks (`/dev/serial/by-id/...`) are
    /// followed so every alias of a node shares one lock.
    pub fn lock_path_for(&self, device_path: &str) -> PathBuf {
        let resolved = fs::canonicalize(device_path).unwrap_or_else(|_| PathBuf::from(device_path));
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| device_path.to_string())
            .replace(['/', '\\', ':'], "_");
        self.lock_dir.join(format!("{LOCK_FILE_PREFIX}{name}"))
    }

    /// Remove the lock artifact of a device nobody holds.
    ///
    /// Returns `Ok(true)` when a file was removed, `Ok(false)` when there was
    /// nothing to remove, and `LockHeld` when the device is in use.
    pub fn clear_stale(&self, device_path: &str) -> Result<bool, LinkError> {
        let lock_path = self.lock_path_for(device_path);
        if !lock_path.exists() {
            return Ok(false);
        }

        // Hold the lock while unlinking so nobody can claim the doomed inode.
        let handle = self.acquire(device_path)?;
        let removed = match fs::remove_file(&lock_path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        drop(handle);

        if removed {
            info!("Removed stale lock {}", lock_path.display());
        }
        Ok(removed)
    }

    fn open_artifact(&self, lock_path: &Path) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        sys::exclusive_open_options(&mut options);
        options.open(lock_path)
    }
}

impl DeviceLock for FileLock {
    fn acquire(&self, device_path: &str) -> Result<LockHandle, LinkError> {
        let lock_path = self.lock_path_for(device_path);

        // The artifact may be unlinked by clear_stale() between our open and
        // our lock; retry until the locked inode is the one on disk.
        for _ in 0..3 {
            let mut file = match self.open_artifact(&lock_path) {
                Ok(file) => file,
                Err(e) if sys::is_contention(&e) => {
                    return Err(LinkError::LockHeld(device_path.to_string()))
                }
                Err(e) => {
                    return Err(LinkError::open_failed(
                        device_path,
                        format!("cannot create lock file {}: {e}", lock_path.display()),
                    ))
                }
            };

            if !sys::try_lock(&file).map_err(|e| {
                LinkError::open_failed(
                    device_path,
                    format!("cannot lock {}: {e}", lock_path.display()),
                )
            })? {
                warn!("{device_path} is locked by another instance ({})", lock_path.display());
                return Err(LinkError::LockHeld(device_path.to_string()));
            }

            if !sys::still_linked(&file, &lock_path) {
                debug!("Lock file {} replaced while locking, retrying", lock_path.display());
                continue;
            }

            if let Err(e) = write_owner(&mut file) {
                debug!("Could not record owner pid in {}: {e}", lock_path.display());
            }

            info!("Locked {device_path} ({})", lock_path.display());
            return Ok(LockHandle {
                device_path: device_path.to_string(),
                lock_path,
                owner: self.id,
                file: Some(file),
            });
        }

        Err(LinkError::LockHeld(device_path.to_string()))
    }

    fn release(&self, handle: &mut LockHandle) {
        if handle.owner != self.id {
            debug!(
                "Ignoring release of {} held by another locker",
                handle.lock_path.display()
            );
            return;
        }
        handle.unlock();
    }

    fn is_locked(&self, device_path: &str) -> bool {
        let lock_path = self.lock_path_for(device_path);
        if !lock_path.exists() {
            return false;
        }

        let mut options = OpenOptions::new();
        options.read(true);
        sys::exclusive_open_options(&mut options);
        match options.open(&lock_path) {
            // The probe claim is dropped with `file` at the end of this arm.
            Ok(file) => match sys::try_lock(&file) {
                Ok(acquired) => !acquired,
                Err(e) => {
                    warn!("Lock probe on {} failed: {e}", lock_path.display());
                    false
                }
            },
            Err(e) if sys::is_contention(&e) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Lock probe on {} failed: {e}", lock_path.display());
                false
            }
        }
    }
}

/// lockdev-style content: the owner pid, right aligned on 10 columns.
fn write_owner(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{:>10}", std::process::id())?;
    file.flush()
}

#[cfg(unix)]
mod sys {
    use std::fs::{self, File, OpenOptions};
    use std::io;
    use std::os::unix::fs::MetadataExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    pub fn exclusive_open_options(_options: &mut OpenOptions) {}

    /// `Ok(true)` when the lock was taken, `Ok(false)` when someone holds it.
    pub fn try_lock(file: &File) -> io::Result<bool> {
        // SAFETY: the descriptor is owned by `file` and valid for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Ok(false)
        } else {
            Err(err)
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        // SAFETY: as above.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn is_contention(_err: &io::Error) -> bool {
        false
    }

    pub fn still_linked(file: &File, path: &Path) -> bool {
        match (file.metadata(), fs::metadata(path)) {
            (Ok(held), Ok(on_disk)) => held.dev() == on_disk.dev() && held.ino() == on_disk.ino(),
            _ => false,
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::windows::fs::OpenOptionsExt;
    use std::path::Path;

    const ERROR_SHARING_VIOLATION: i32 = 32;
    const ERROR_LOCK_VIOLATION: i32 = 33;
    const FILE_SHARE_DELETE: u32 = 0x4;

    /// No read/write sharing: the open handle itself is the lock. Delete
    /// sharing keeps clear_stale() able to unlink while holding it.
    pub fn exclusive_open_options(options: &mut OpenOptions) {
        options.share_mode(FILE_SHARE_DELETE);
    }

    pub fn try_lock(_file: &File) -> io::Result<bool> {
        Ok(true)
    }

    pub fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub fn is_contention(err: &io::Error) -> bool {
        matches!(
            err.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
        )
    }

    pub fn still_linked(_file: &File, path: &Path) -> bool {
        path.exists()
    }
}
