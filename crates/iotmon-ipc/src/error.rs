use std::io;
use thiserror::Error;

/// Failure to create or attach a system-wide IPC object. Fatal at startup:
/// the server cannot run without its arena and guard semaphore.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("key derivation failed for {path}:{id}: {source}")]
    KeyDerivation {
        path: String,
        id: i32,
        source: io::Error,
    },

    #[error("an object already exists for key {path}:{id}")]
    AlreadyExists { path: String, id: i32 },

    #[error("no object to attach for key {path}:{id}")]
    NotFound { path: String, id: i32 },

    #[error("ipc syscall failed: {0}")]
    Sys(#[from] io::Error),
}

/// Failure on an already-open queue or semaphore. Reported to the caller;
/// never tears down the process on its own.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Non-blocking receive found no message matching the selector.
    #[error("no matching message in the queue")]
    Empty,

    /// The underlying object was removed while we held a handle to it.
    #[error("ipc object was removed")]
    Removed,

    #[error("ipc syscall failed: {0}")]
    Sys(#[from] io::Error),
}

impl IpcError {
    pub(crate) fn from_errno() -> Self {
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ENOMSG) | Some(libc::EAGAIN) => IpcError::Empty,
            Some(libc::EIDRM) | Some(libc::EINVAL) => IpcError::Removed,
            _ => IpcError::Sys(err),
        }
    }
}
