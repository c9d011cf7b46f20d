use nix::sys::pthread::{pthread_kill, Pthread};
use nix::sys::signal::{
    kill, pthread_sigmask, sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::unistd::Pid;

use crate::SignalError;

/// Registers `handler` for `signal`. `blocked_during_handler` lists signals
/// masked out while the handler runs.
///
/// Handlers must be async-signal-safe; in this codebase that means a single
/// store to an `AtomicBool` and nothing else.
pub fn install(
    signal: Signal,
    handler: extern "C" fn(libc::c_int),
    flags: SaFlags,
    blocked_during_handler: &[Signal],
) -> Result<(), SignalError> {
    let mut mask = SigSet::empty();
    for sig in blocked_during_handler {
        mask.add(*sig);
    }
    let action = SigAction::new(SigHandler::Handler(handler), flags, mask);
    // # Safety: the handler is a plain extern "C" fn restricted to the
    // flag-store discipline documented above.
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .map_err(SignalError::Install)
}

/// Delivered occurrences of `signal` are discarded (`SIG_IGN`).
pub fn ignore(signal: Signal) -> Result<(), SignalError> {
    let action = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .map_err(SignalError::Install)
}

/// Restores the default disposition for `signal` (`SIG_DFL`).
pub fn restore_default(signal: Signal) -> Result<(), SignalError> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .map_err(SignalError::Install)
}

/// Blocks `signal` for the calling thread; it stays pending until unblocked.
pub fn block(signal: Signal) -> Result<(), SignalError> {
    let mut mask = SigSet::empty();
    mask.add(signal);
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&mask), None).map_err(SignalError::Mask)
}

/// Unblocks a previously blocked `signal` for the calling thread.
pub fn unblock(signal: Signal) -> Result<(), SignalError> {
    let mut mask = SigSet::empty();
    mask.add(signal);
    pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&mask), None).map_err(SignalError::Mask)
}

/// Resets the calling thread's mask to empty.
pub fn unblock_all() -> Result<(), SignalError> {
    pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
        .map_err(SignalError::Mask)
}

/// Sends `signal` to a process.
pub fn send(pid: Pid, signal: Signal) -> Result<(), SignalError> {
    kill(pid, signal).map_err(SignalError::Send)
}

/// Sends `signal` to a specific thread in this process.
pub fn send_thread(thread: Pthread, signal: Signal) -> Result<(), SignalError> {
    pthread_kill(thread, signal).map_err(SignalError::Send)
}

/// Blocks the calling thread until `signal` arrives, running its handler
/// before returning. Lets a dedicated waiting thread be interrupted
/// deterministically.
pub fn wait_for(signal: Signal) -> Result<(), SignalError> {
    let mut mask = SigSet::all();
    mask.remove(signal);
    // sigsuspend reports EINTR by contract once the handler has run.
    match mask.suspend() {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EINTR) => Ok(()),
        Err(e) => Err(SignalError::Wait(e)),
    }
}

/// Blocks until `signal` arrives and consumes it without executing any
/// handler. The signal is blocked for the duration of the wait; the caller's
/// previous mask is restored before returning.
pub fn wait_and_consume(signal: Signal) -> Result<(), SignalError> {
    let mut mask = SigSet::empty();
    mask.add(signal);
    let mut prior = SigSet::empty();
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&mask), Some(&mut prior))
        .map_err(SignalError::Mask)?;
    let consumed = mask.wait().map(drop).map_err(SignalError::Wait);
    pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&prior), None).map_err(SignalError::Mask)?;
    consumed
}
