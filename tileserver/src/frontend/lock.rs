//! Exclusive claims on file-queue markers.
//!
//! A claim is a non-blocking exclusive advisory lock on the marker file
//! itself. Whoever holds it renders the request; everyone else drops the
//! item. The lock is released when the claim is dropped.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from marker claims.
#[derive(Debug, Error)]
pub enum LockError {
    /// The marker disappeared before it could be opened.
    #[error("marker vanished: {}", .0.display())]
    Vanished(PathBuf),

    #[error("I/O error locking {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An exclusively held marker file.
#[derive(Debug)]
pub struct MarkerClaim {
    path: PathBuf,
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl MarkerClaim {
    /// Try to claim `path` without blocking.
    ///
    /// Returns `Ok(None)` when another holder owns the marker.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LockError::Vanished(path.to_path_buf()))
            }
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match Self::lock_exclusive(path, &file) {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file,
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn lock_exclusive(_path: &Path, file: &File) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "marker claimed"))
        } else {
            Err(err)
        }
    }

    /// Without flock, a sidecar created with `create_new` stands in.
    #[cfg(not(unix))]
    fn lock_exclusive(path: &Path, _file: &File) -> io::Result<()> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(Self::sidecar(path))
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "marker claimed"))
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(not(unix))]
    fn sidecar(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }
}

impl Drop for MarkerClaim {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(Self::sidecar(&self.path));
        }
    }
}
