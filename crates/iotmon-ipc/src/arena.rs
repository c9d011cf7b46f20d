use core::ffi::c_void;
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::path::Path;

use crate::error::ResourceError;
use crate::key;

/// A named, fixed-layout shared memory record visible to every process that
/// opens the same `(path, id)` key.
///
/// The segment holds `slots` consecutive copies of `T` and is zero-filled by
/// the kernel at creation. The arena itself owns no synchronization: a
/// cross-process read-modify-write must be bracketed by a [`crate::Semaphore`].
///
/// ## Teardown
/// Dropping any handle detaches the mapping. The system-wide segment is
/// removed only when the dropped handle is the creator *and* the drop runs on
/// the thread that created it, so a handle duplicated into a child process
/// releases its attachment without destroying state the parent still uses.
pub struct SharedArena<T> {
    shmid: libc::c_int,
    base: NonNull<T>,
    slots: usize,
    creator: bool,
    owner_tid: libc::pid_t,
    _marker: PhantomData<T>,
}

impl<T: Copy> SharedArena<T> {
    /// Creates a new zero-initialized segment. Fails with
    /// [`ResourceError::AlreadyExists`] if the key is already taken.
    pub fn create(path: &Path, id: i32, slots: usize) -> Result<Self, ResourceError> {
        Self::build(path, id, slots, true)
    }

    /// Attaches to an existing segment. Fails with
    /// [`ResourceError::NotFound`] if nothing was created under this key.
    pub fn attach(path: &Path, id: i32, slots: usize) -> Result<Self, ResourceError> {
        Self::build(path, id, slots, false)
    }

    /// Create-or-attach dispatcher keyed on `create`.
    pub fn open(path: &Path, id: i32, slots: usize, create: bool) -> Result<Self, ResourceError> {
        Self::build(path, id, slots, create)
    }

    fn build(path: &Path, id: i32, slots: usize, create: bool) -> Result<Self, ResourceError> {
        assert!(slots > 0, "arena needs at least one slot");
        let ipc_key = key::derive(path, id)?;
        let size = slots * core::mem::size_of::<T>();
        let flags = if create {
            libc::IPC_CREAT | libc::IPC_EXCL | 0o666
        } else {
            0
        };
        let shmid = unsafe { libc::shmget(ipc_key, if create { size } else { 0 }, flags) };
        if shmid == -1 {
            return Err(key::open_error(path, id, create));
        }
        let addr = unsafe { libc::shmat(shmid, core::ptr::null(), 0) };
        if addr == usize::MAX as *mut c_void {
            return Err(ResourceError::Sys(std::io::Error::last_os_error()));
        }
        let base = NonNull::new(addr as *mut T)
            .ok_or_else(|| ResourceError::Sys(std::io::Error::last_os_error()))?;
        Ok(Self {
            shmid,
            base,
            slots,
            creator: create,
            owner_tid: unsafe { libc::gettid() },
            _marker: PhantomData,
        })
    }

    /// True if an object already exists under this key.
    pub fn exists(path: &Path, id: i32) -> bool {
        match key::derive(path, id) {
            Ok(k) => (unsafe { libc::shmget(k, 0, 0) }) != -1,
            Err(_) => false,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn is_creator(&self) -> bool {
        self.creator
    }

    /// Copies slot `idx` out of shared memory.
    pub fn load(&self, idx: usize) -> T {
        assert!(idx < self.slots);
        // # Safety: idx is bounds-checked and the mapping stays valid until drop.
        unsafe { self.base.as_ptr().add(idx).read() }
    }

    /// Replaces the whole record in slot `idx`.
    pub fn store(&self, idx: usize, value: T) {
        assert!(idx < self.slots);
        unsafe { self.base.as_ptr().add(idx).write(value) }
    }

    /// In-place read-modify-write of slot `idx`.
    ///
    /// Not atomic across processes: the caller must hold the guard
    /// semaphore for the duration of the closure.
    pub fn update<R>(&self, idx: usize, f: impl FnOnce(&mut T) -> R) -> R {
        assert!(idx < self.slots);
        let mut value = self.load(idx);
        let out = f(&mut value);
        self.store(idx, value);
        out
    }
}

impl<T> Drop for SharedArena<T> {
    fn drop(&mut self) {
        // # Safety: base came from shmat and is detached exactly once.
        unsafe {
            libc::shmdt(self.base.as_ptr() as *const c_void);
            if self.creator && libc::gettid() == self.owner_tid {
                tracing::debug!(shmid = self.shmid, "removing shared memory segment");
                libc::shmctl(self.shmid, libc::IPC_RMID, core::ptr::null_mut());
            }
        }
    }
}

// The segment outlives any one thread; concurrent access discipline is on
// the callers (guard semaphore), same as for the raw slot pointers.
unsafe impl<T: Copy + Send> Send for SharedArena<T> {}
unsafe impl<T: Copy + Send> Sync for SharedArena<T> {}
