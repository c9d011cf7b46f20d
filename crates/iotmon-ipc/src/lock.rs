use core::cell::UnsafeCell;
use std::io;

/// In-process mutual exclusion, thread scope only.
///
/// Deliberately *not* used to protect the shared arena: that state is
/// cross-process and guarded by the [`crate::Semaphore`] instead. This is a
/// plain `lock`/`unlock` surface over a pthread mutex for in-process-only
/// critical sections.
pub struct Lock {
    inner: UnsafeCell<libc::pthread_mutex_t>,
}

impl Lock {
    pub fn new() -> Self {
        Self {
            inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
        }
    }

    /// Blocks until the lock is held.
    pub fn lock(&self) -> Result<(), io::Error> {
        let rc = unsafe { libc::pthread_mutex_lock(self.inner.get()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    /// Releases the lock. The caller must currently hold it.
    pub fn unlock(&self) -> Result<(), io::Error> {
        let rc = unsafe { libc::pthread_mutex_unlock(self.inner.get()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    /// Attempts the lock without blocking; `true` if it was acquired.
    pub fn try_lock(&self) -> bool {
        unsafe { libc::pthread_mutex_trylock(self.inner.get()) == 0 }
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_destroy(self.inner.get());
        }
    }
}

unsafe impl Send for Lock {}
unsafe impl Sync for Lock {}
