//! Signal handling and interval timers for the monitoring server.
//!
//! The contract that matters here: a handler may run in the middle of an
//! arbitrary syscall, so handlers registered through this crate are expected
//! to do nothing beyond storing to a flag. Anything heavier (the
//! configuration reload itself) happens in ordinary code between blocking
//! operations; the accept loop polls the flag once per cycle.

pub mod signals;
pub mod timer;

pub use signals::{
    block, ignore, install, restore_default, send, send_thread, unblock, unblock_all, wait_and_consume,
    wait_for,
};
pub use timer::{arm_timer, disarm_timer, remaining_timer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("sigaction failed: {0}")]
    Install(nix::errno::Errno),
    #[error("signal mask update failed: {0}")]
    Mask(nix::errno::Errno),
    #[error("signal delivery failed: {0}")]
    Send(nix::errno::Errno),
    #[error("signal wait failed: {0}")]
    Wait(nix::errno::Errno),
    #[error("timer syscall failed: {0}")]
    Timer(std::io::Error),
}
