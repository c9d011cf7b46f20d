//! # Signal & timer facility tests
//!
//! Real deliveries against this test process. Waits use thread-directed
//! signals (`send_thread`) so the runner's other threads can never swallow
//! the delivery; flag checks use signals whose default disposition is
//! harmless in case one arrives early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

// ITIMER_REAL is per-process: the two timer tests must not overlap.
static TIMER_LOCK: Mutex<()> = Mutex::new(());

use iotmon_signal::SignalError;
use nix::sys::pthread::pthread_self;
use nix::sys::signal::{SaFlags, Signal};

static ALRM_SEEN: AtomicBool = AtomicBool::new(false);
static USR2_SEEN: AtomicBool = AtomicBool::new(false);
static WINCH_SEEN: AtomicBool = AtomicBool::new(false);

extern "C" fn note_alrm(_signal: libc::c_int) {
    ALRM_SEEN.store(true, Ordering::Relaxed);
}

extern "C" fn note_usr2(_signal: libc::c_int) {
    USR2_SEEN.store(true, Ordering::Relaxed);
}

extern "C" fn note_winch(_signal: libc::c_int) {
    WINCH_SEEN.store(true, Ordering::Relaxed);
}

/// A one-shot timer raises `SIGALRM` once; after expiry nothing remains
/// armed. The handler only sets a flag, polled here like the accept loop
/// polls the reload flag.
#[test]
fn one_shot_timer_fires_once() {
    let _timer = TIMER_LOCK.lock().unwrap();
    iotmon_signal::install(Signal::SIGALRM, note_alrm, SaFlags::empty(), &[]).unwrap();
    iotmon_signal::arm_timer(Duration::from_millis(30), false).unwrap();

    let remaining = iotmon_signal::remaining_timer().unwrap();
    assert!(remaining <= Duration::from_millis(30));

    let mut waited = Duration::ZERO;
    while !ALRM_SEEN.load(Ordering::Relaxed) && waited < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(10));
        waited += Duration::from_millis(10);
    }
    assert!(ALRM_SEEN.load(Ordering::Relaxed), "timer never fired");

    // One-shot: nothing left on the clock.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(iotmon_signal::remaining_timer().unwrap(), Duration::ZERO);
}

/// `wait_for` blocks until the signal arrives and runs its handler before
/// returning.
#[test]
fn wait_for_runs_the_handler_first() {
    iotmon_signal::install(Signal::SIGUSR2, note_usr2, SaFlags::empty(), &[]).unwrap();

    let target = pthread_self();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        iotmon_signal::send_thread(target, Signal::SIGUSR2).unwrap();
    });

    iotmon_signal::wait_for(Signal::SIGUSR2).unwrap();
    assert!(
        USR2_SEEN.load(Ordering::Relaxed),
        "handler must have run before wait_for returned"
    );
    sender.join().unwrap();
}

/// `wait_and_consume` absorbs the signal without executing any handler.
/// `SIGURG` has no handler installed here and is ignored by default, so a
/// stray early delivery could not hurt either.
#[test]
fn wait_and_consume_runs_no_handler() {
    let target = pthread_self();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        iotmon_signal::send_thread(target, Signal::SIGURG).unwrap();
    });

    iotmon_signal::wait_and_consume(Signal::SIGURG).unwrap();
    sender.join().unwrap();
}

/// `wait_and_consume` leaves the caller's mask exactly as it found it: a
/// handler installed afterwards still sees the next delivery. `SIGWINCH` is
/// ignored by default, so a stray delivery before the install is harmless.
#[test]
fn wait_and_consume_restores_the_mask() {
    let target = pthread_self();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        iotmon_signal::send_thread(target, Signal::SIGWINCH).unwrap();
    });
    iotmon_signal::wait_and_consume(Signal::SIGWINCH).unwrap();
    sender.join().unwrap();

    // The signal must be deliverable again on this thread, not left pending.
    iotmon_signal::install(Signal::SIGWINCH, note_winch, SaFlags::empty(), &[]).unwrap();
    iotmon_signal::send_thread(pthread_self(), Signal::SIGWINCH).unwrap();

    let mut waited = Duration::ZERO;
    while !WINCH_SEEN.load(Ordering::Relaxed) && waited < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(10));
        waited += Duration::from_millis(10);
    }
    assert!(
        WINCH_SEEN.load(Ordering::Relaxed),
        "delivery swallowed: mask not restored after the wait"
    );
}

/// Mask manipulation round trip.
#[test]
fn mask_round_trip() -> Result<(), SignalError> {
    iotmon_signal::block(Signal::SIGWINCH)?;
    iotmon_signal::unblock(Signal::SIGWINCH)?;
    iotmon_signal::block(Signal::SIGWINCH)?;
    iotmon_signal::unblock_all()
}

/// Disarming clears both the pending expiration and the interval.
#[test]
fn disarm_clears_the_timer() {
    let _timer = TIMER_LOCK.lock().unwrap();
    // Periodic arm on a generous period nothing will reach.
    iotmon_signal::install(Signal::SIGALRM, note_alrm, SaFlags::empty(), &[]).unwrap();
    iotmon_signal::arm_timer(Duration::from_secs(600), true).unwrap();
    assert!(iotmon_signal::remaining_timer().unwrap() > Duration::ZERO);

    iotmon_signal::disarm_timer().unwrap();
    assert_eq!(iotmon_signal::remaining_timer().unwrap(), Duration::ZERO);
}
