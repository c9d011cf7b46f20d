use core::marker::PhantomData;
use std::io;
use std::path::Path;

use crate::error::{IpcError, ResourceError};
use crate::key;

/// Which message a [`MessageQueue::receive`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The oldest message regardless of tag.
    Any,
    /// The oldest message carrying exactly this tag.
    Exact(i64),
    /// The oldest message among the *lowest* tags not exceeding `k`: a
    /// message with tag 1 is always preferred over one with tag 2, FIFO
    /// within a tag.
    AtMost(i64),
}

impl Selector {
    fn mtype(self) -> libc::c_long {
        match self {
            Selector::Any => 0,
            Selector::Exact(t) => t as libc::c_long,
            Selector::AtMost(k) => -(k as libc::c_long),
        }
    }

    fn admits(self, tag: i64) -> bool {
        match self {
            Selector::Any => true,
            Selector::Exact(t) => tag == t,
            Selector::AtMost(k) => tag <= k,
        }
    }
}

/// On-queue wire layout: the kernel requires the tag as a leading `c_long`.
#[repr(C)]
#[derive(Clone, Copy)]
struct Envelope<T> {
    tag: libc::c_long,
    payload: T,
}

/// Typed, cross-process, priority-selectable message channel.
///
/// `T` must be `Copy` with a layout that is identical in every process
/// sharing the queue (`#[repr(C)]` and no pointers). Same lifecycle contract
/// as the arena: strict create-vs-attach, creator-only removal, and removal
/// only from the creating thread.
pub struct MessageQueue<T> {
    msqid: libc::c_int,
    creator: bool,
    owner_tid: libc::pid_t,
    _marker: PhantomData<T>,
}

impl<T: Copy> MessageQueue<T> {
    pub fn create(path: &Path, id: i32) -> Result<Self, ResourceError> {
        Self::build(path, id, true)
    }

    pub fn attach(path: &Path, id: i32) -> Result<Self, ResourceError> {
        Self::build(path, id, false)
    }

    /// Create-or-attach dispatcher keyed on `create`.
    pub fn open(path: &Path, id: i32, create: bool) -> Result<Self, ResourceError> {
        Self::build(path, id, create)
    }

    fn build(path: &Path, id: i32, create: bool) -> Result<Self, ResourceError> {
        let ipc_key = key::derive(path, id)?;
        let msqid = if create {
            unsafe { libc::msgget(ipc_key, libc::IPC_CREAT | libc::IPC_EXCL | 0o666) }
        } else {
            unsafe { libc::msgget(ipc_key, 0) }
        };
        if msqid == -1 {
            return Err(key::open_error(path, id, create));
        }
        Ok(Self {
            msqid,
            creator: create,
            owner_tid: unsafe { libc::gettid() },
            _marker: PhantomData,
        })
    }

    /// True if an object already exists under this key.
    pub fn exists(path: &Path, id: i32) -> bool {
        match key::derive(path, id) {
            Ok(k) => (unsafe { libc::msgget(k, 0) }) != -1,
            Err(_) => false,
        }
    }

    pub fn is_creator(&self) -> bool {
        self.creator
    }

    /// Enqueues `payload` under `tag`. Tags below 1 are clamped to 1 (the
    /// kernel rejects non-positive types on send).
    pub fn send(&self, payload: T, tag: i64) -> Result<(), IpcError> {
        let env = Envelope {
            tag: tag.max(1) as libc::c_long,
            payload,
        };
        loop {
            let rc = unsafe {
                libc::msgsnd(
                    self.msqid,
                    &env as *const Envelope<T> as *const libc::c_void,
                    core::mem::size_of::<T>(),
                    0,
                )
            };
            if rc == 0 {
                return Ok(());
            }
            if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(IpcError::from_errno());
        }
    }

    /// Dequeues the message chosen by `selector`.
    ///
    /// With `blocking == false` and no eligible message, fails with
    /// [`IpcError::Empty`], which callers can tell apart from a fatal error.
    pub fn receive(&self, selector: Selector, blocking: bool) -> Result<T, IpcError> {
        let flags = if blocking { 0 } else { libc::IPC_NOWAIT };
        let mut env = core::mem::MaybeUninit::<Envelope<T>>::uninit();
        loop {
            let rc = unsafe {
                libc::msgrcv(
                    self.msqid,
                    env.as_mut_ptr() as *mut libc::c_void,
                    core::mem::size_of::<T>(),
                    selector.mtype(),
                    flags,
                )
            };
            if rc >= 0 {
                // # Safety: the kernel filled tag and payload bytes; T is
                // plain shared-layout data by this queue's contract.
                return Ok(unsafe { env.assume_init() }.payload);
            }
            if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(IpcError::from_errno());
        }
    }

    /// Copies the message `receive(selector, ..)` would return, without
    /// removing it. `Ok(None)` means no eligible message.
    ///
    /// Implemented as a positional `MSG_COPY` scan; kernels built without
    /// checkpoint/restore support report `ENOSYS`, surfaced as
    /// [`IpcError::Sys`].
    pub fn peek(&self, selector: Selector) -> Result<Option<(i64, T)>, IpcError> {
        let mut best: Option<(i64, T)> = None;
        for index in 0i64.. {
            let mut slot = core::mem::MaybeUninit::<Envelope<T>>::uninit();
            let rc = unsafe {
                libc::msgrcv(
                    self.msqid,
                    slot.as_mut_ptr() as *mut libc::c_void,
                    core::mem::size_of::<T>(),
                    index as libc::c_long,
                    libc::MSG_COPY | libc::IPC_NOWAIT,
                )
            };
            if rc < 0 {
                match IpcError::from_errno() {
                    // Scanned past the last queued message.
                    IpcError::Empty => break,
                    other => return Err(other),
                }
            }
            let env = unsafe { slot.assume_init() };
            let tag = env.tag as i64;
            if !selector.admits(tag) {
                continue;
            }
            match selector {
                // Positional order is arrival order, so the first hit wins.
                Selector::Any | Selector::Exact(_) => return Ok(Some((tag, env.payload))),
                // Bounded selection prefers the lowest tag; keep scanning.
                Selector::AtMost(_) => {
                    if best.map_or(true, |(t, _)| tag < t) {
                        best = Some((tag, env.payload));
                    }
                }
            }
        }
        Ok(best)
    }

    /// Number of queued messages. Queried fresh from the kernel on every
    /// call; other processes mutate the queue concurrently, so no counter
    /// is cached.
    pub fn len(&self) -> Result<usize, IpcError> {
        let mut info: libc::msqid_ds = unsafe { core::mem::zeroed() };
        let rc = unsafe { libc::msgctl(self.msqid, libc::IPC_STAT, &mut info) };
        if rc == -1 {
            return Err(IpcError::from_errno());
        }
        Ok(info.msg_qnum as usize)
    }

    pub fn is_empty(&self) -> Result<bool, IpcError> {
        Ok(self.len()? == 0)
    }

    pub fn has_message(&self) -> Result<bool, IpcError> {
        Ok(self.len()? > 0)
    }
}

impl<T> Drop for MessageQueue<T> {
    fn drop(&mut self) {
        if self.creator && unsafe { libc::gettid() } == self.owner_tid {
            tracing::debug!(msqid = self.msqid, "removing message queue");
            unsafe {
                libc::msgctl(self.msqid, libc::IPC_RMID, core::ptr::null_mut());
            }
        }
    }
}

unsafe impl<T: Copy + Send> Send for MessageQueue<T> {}
unsafe impl<T: Copy + Send> Sync for MessageQueue<T> {}
