//! Sensor-sampling sibling process.
//!
//! Attaches the deployment's shared arena for its sampling period and filter
//! width, arms the periodic interval timer, and on every `SIGALRM` pushes a
//! moving-average-smoothed reading into the shared message queue. The server
//! process must already be running (it owns arena creation).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use iotmon::config::ServerConfig;
use iotmon::engine::{ARENA_KEY_ID, SAMPLE_QUEUE_KEY_ID};
use iotmon::sampling::{MovingAverage, SensorReading, READING_TAG};
use iotmon_ipc::{MessageQueue, ResourceError, SharedArena};
use nix::sys::signal::{SaFlags, Signal};

static TICK: AtomicBool = AtomicBool::new(false);

extern "C" fn alarm_handler(_signal: libc::c_int) {
    TICK.store(true, Ordering::Relaxed);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let key_path = Path::new(".");
    let arena = SharedArena::<ServerConfig>::attach(key_path, ARENA_KEY_ID, 1)?;
    let queue = match MessageQueue::<SensorReading>::create(key_path, SAMPLE_QUEUE_KEY_ID) {
        Ok(queue) => queue,
        Err(ResourceError::AlreadyExists { .. }) => {
            MessageQueue::attach(key_path, SAMPLE_QUEUE_KEY_ID)?
        }
        Err(e) => return Err(e.into()),
    };

    iotmon_signal::install(Signal::SIGALRM, alarm_handler, SaFlags::empty(), &[])?;

    let mut cfg = arena.load(0);
    let mut filter = MovingAverage::new(cfg.samples_moving_average_filter.max(1) as usize);
    iotmon_signal::arm_timer(period_of(&cfg), true)?;
    tracing::info!(
        pid = std::process::id(),
        period_ms = cfg.sensor_period,
        window = cfg.samples_moving_average_filter,
        "sampler up"
    );

    let mut sequence: u32 = 0;
    loop {
        iotmon_signal::wait_for(Signal::SIGALRM)?;
        if !TICK.swap(false, Ordering::Relaxed) {
            continue;
        }

        // Pick up hot-reloaded parameters between ticks.
        let current = arena.load(0);
        if current.sensor_period != cfg.sensor_period {
            iotmon_signal::arm_timer(period_of(&current), true)?;
        }
        if current.samples_moving_average_filter != cfg.samples_moving_average_filter {
            filter.reset(current.samples_moving_average_filter.max(1) as usize);
        }
        cfg = current;

        let raw = read_sensor(sequence);
        let smoothed = filter.push(raw as f64);
        let reading = SensorReading {
            sequence,
            millivolts: smoothed.round() as i32,
        };
        if let Err(e) = queue.send(reading, READING_TAG) {
            tracing::warn!(error = %e, sequence, "reading dropped");
        }
        sequence = sequence.wrapping_add(1);
    }
}

fn period_of(cfg: &ServerConfig) -> Duration {
    Duration::from_millis(cfg.sensor_period.max(1) as u64)
}

/// Stand-in for the ADC read: a deterministic triangle wave in millivolts.
fn read_sensor(sequence: u32) -> i32 {
    let phase = (sequence % 40) as i32;
    if phase < 20 {
        1500 + phase * 50
    } else {
        1500 + (40 - phase) * 50
    }
}
