use std::io;
use std::time::Duration;

use crate::SignalError;

/// Arms the per-process real-time interval timer: `SIGALRM` is raised
/// against the process after `period`, once (`repeating == false`) or every
/// `period` (`repeating == true`). The kernel picks any thread with the
/// signal unblocked for delivery.
pub fn arm_timer(period: Duration, repeating: bool) -> Result<(), SignalError> {
    let value = to_timeval(period);
    let interval = if repeating {
        value
    } else {
        libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        }
    };
    set(libc::itimerval { it_interval: interval, it_value: value })
}

/// Disarms the timer; a pending expiration is cancelled.
pub fn disarm_timer() -> Result<(), SignalError> {
    let zero = libc::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    set(libc::itimerval {
        it_interval: zero,
        it_value: zero,
    })
}

/// Time left until the next expiration; zero when disarmed.
pub fn remaining_timer() -> Result<Duration, SignalError> {
    let mut timer: libc::itimerval = unsafe { core::mem::zeroed() };
    let rc = unsafe { libc::getitimer(libc::ITIMER_REAL, &mut timer) };
    if rc != 0 {
        return Err(SignalError::Timer(io::Error::last_os_error()));
    }
    Ok(Duration::new(
        timer.it_value.tv_sec as u64,
        (timer.it_value.tv_usec as u32) * 1_000,
    ))
}

fn set(timer: libc::itimerval) -> Result<(), SignalError> {
    let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, core::ptr::null_mut()) };
    if rc != 0 {
        return Err(SignalError::Timer(io::Error::last_os_error()));
    }
    Ok(())
}

fn to_timeval(period: Duration) -> libc::timeval {
    libc::timeval {
        tv_sec: period.as_secs() as libc::time_t,
        tv_usec: period.subsec_micros() as libc::suseconds_t,
    }
}
