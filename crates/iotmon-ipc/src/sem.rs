use std::io;
use std::path::Path;

use crate::error::{IpcError, ResourceError};
use crate::key;

/// Cross-process counting semaphore guarding the shared arena.
///
/// Strict-create semantics: creation initializes the count to 1 and fails if
/// the key is already taken; everyone else attaches. A writer brackets its
/// arena mutation with `apply(-1)` / `apply(1)`.
pub struct Semaphore {
    semid: libc::c_int,
    creator: bool,
    owner_tid: libc::pid_t,
}

impl Semaphore {
    /// Creates the semaphore with an initial count of 1.
    pub fn create(path: &Path, id: i32) -> Result<Self, ResourceError> {
        Self::build(path, id, true)
    }

    /// Attaches to an existing semaphore.
    pub fn attach(path: &Path, id: i32) -> Result<Self, ResourceError> {
        Self::build(path, id, false)
    }

    /// Create-or-attach dispatcher keyed on `create`.
    pub fn open(path: &Path, id: i32, create: bool) -> Result<Self, ResourceError> {
        Self::build(path, id, create)
    }

    fn build(path: &Path, id: i32, create: bool) -> Result<Self, ResourceError> {
        let ipc_key = key::derive(path, id)?;
        let semid = if create {
            unsafe { libc::semget(ipc_key, 1, libc::IPC_CREAT | libc::IPC_EXCL | 0o666) }
        } else {
            unsafe { libc::semget(ipc_key, 0, 0) }
        };
        if semid == -1 {
            return Err(key::open_error(path, id, create));
        }
        let sem = Self {
            semid,
            creator: create,
            owner_tid: unsafe { libc::gettid() },
        };
        if create {
            sem.set(1).map_err(|e| match e {
                IpcError::Sys(err) => ResourceError::Sys(err),
                other => ResourceError::Sys(io::Error::other(other)),
            })?;
        }
        Ok(sem)
    }

    /// True if an object already exists under this key.
    pub fn exists(path: &Path, id: i32) -> bool {
        match key::derive(path, id) {
            Ok(k) => (unsafe { libc::semget(k, 0, 0) }) != -1,
            Err(_) => false,
        }
    }

    pub fn is_creator(&self) -> bool {
        self.creator
    }

    /// Forces the count to `value`.
    pub fn set(&self, value: i32) -> Result<(), IpcError> {
        // glibc passes the semun union in a register; an int works for SETVAL.
        let rc = unsafe { libc::semctl(self.semid, 0, libc::SETVAL, value) };
        if rc == -1 {
            return Err(IpcError::from_errno());
        }
        Ok(())
    }

    /// Reads the current count.
    pub fn value(&self) -> Result<i32, IpcError> {
        let rc = unsafe { libc::semctl(self.semid, 0, libc::GETVAL) };
        if rc == -1 {
            return Err(IpcError::from_errno());
        }
        Ok(rc)
    }

    /// The single semaphore operation, with SysV blocking semantics:
    ///
    /// * `delta == 0`: block until the count reaches exactly 0.
    /// * `delta > 0`: add `delta` to the count (release/signal).
    /// * `delta < 0`: subtract `|delta|`; blocks until the count covers it,
    ///   so the count never goes negative.
    ///
    /// Interrupted waits (the interval timer fires `SIGALRM` while a worker
    /// is blocked here) are transparently retried.
    pub fn apply(&self, delta: i32) -> Result<(), IpcError> {
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: delta as libc::c_short,
            sem_flg: 0,
        };
        loop {
            let rc = unsafe { libc::semop(self.semid, &mut op, 1) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(IpcError::from_errno());
        }
    }

    /// `apply(1)`.
    pub fn increment(&self) -> Result<(), IpcError> {
        self.apply(1)
    }

    /// `apply(-1)`.
    pub fn decrement(&self) -> Result<(), IpcError> {
        self.apply(-1)
    }

    /// `apply(0)`: blocks until the count reaches 0.
    pub fn wait_zero(&self) -> Result<(), IpcError> {
        self.apply(0)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        if self.creator && unsafe { libc::gettid() } == self.owner_tid {
            tracing::debug!(semid = self.semid, "removing semaphore");
            unsafe {
                libc::semctl(self.semid, 0, libc::IPC_RMID);
            }
        }
    }
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}
