//! Cross-process coordination primitives for the monitoring server.
//!
//! Every object here is a named System V IPC resource identified by a
//! `(path, id)` key pair: any two processes opening the same pair reach the
//! same kernel object. Create-vs-attach is strict: creating an existing
//! object or attaching to a missing one fails with [`ResourceError`], and
//! teardown is creator-only: the handle that created the object removes it
//! from the system, and only when dropped on the thread that created it, so
//! a forked duplicate never deletes a resource its sibling still needs.

pub mod arena;
pub mod error;
pub mod lock;
pub mod queue;
pub mod sem;

mod key;

pub use arena::SharedArena;
pub use error::{IpcError, ResourceError};
pub use lock::Lock;
pub use queue::{MessageQueue, Selector};
pub use sem::Semaphore;
