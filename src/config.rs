use std::fs;
use std::path::Path;

pub const DEFAULT_BACKLOG: i32 = 2;
pub const DEFAULT_MAX_CLIENTS: i32 = 1000;
pub const DEFAULT_SENSOR_PERIOD: i32 = 1000;
pub const DEFAULT_SAMPLES_MOVING_AVERAGE_FILTER: i32 = 5;

/// The record held in the shared arena, one logical instance per
/// deployment, attached by the server workers and the sampler process.
///
/// `#[repr(C)]` because the layout must be identical in every attached
/// process. All fields except `client_count` are positive once the first
/// configuration load has run.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub backlog: i32,
    pub max_clients: i32,
    pub sensor_period: i32,
    pub samples_moving_average_filter: i32,
    pub client_count: i32,
}

// The record crosses a process boundary through shared memory; its size
// must not drift.
static_assertions::assert_eq_size!(ServerConfig, [i32; 5]);

impl ServerConfig {
    /// The pre-first-load state of a freshly created arena slot.
    pub fn zeroed() -> Self {
        Self {
            backlog: 0,
            max_clients: 0,
            sensor_period: 0,
            samples_moving_average_filter: 0,
            client_count: 0,
        }
    }

    /// Resets every configurable field to its compiled-in default. The
    /// client counter is operational state, not configuration, and survives.
    pub fn apply_defaults(&mut self) {
        self.backlog = DEFAULT_BACKLOG;
        self.max_clients = DEFAULT_MAX_CLIENTS;
        self.sensor_period = DEFAULT_SENSOR_PERIOD;
        self.samples_moving_average_filter = DEFAULT_SAMPLES_MOVING_AVERAGE_FILTER;
    }
}

/// What a reload pass did, per line. Warnings also go to the log channel;
/// the events exist so callers (and tests) can observe outcomes directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// A recognized key changed to a new, valid value.
    Applied { key: &'static str, value: i32 },
    /// A recognized key carried an unparseable or non-positive value; the
    /// prior value was kept.
    Invalid { key: String },
    /// An unrecognized key was skipped.
    Unknown { key: String },
    /// The file could not be opened; every field fell back to its default.
    MissingFile,
}

/// Re-reads the `key=value` configuration file into `cfg`.
///
/// Rules, in order, per line: lines without `=` are skipped; unknown keys are
/// reported and skipped; a value that fails to parse as a positive integer is
/// rejected with a warning and the prior value kept; a value identical to the
/// current one is a silent no-op. A missing file resets every field to its
/// compiled-in default.
pub fn reload_from_file(path: &Path, cfg: &mut ServerConfig) -> Vec<ConfigEvent> {
    let mut events = Vec::new();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(
                file = %path.display(),
                "could not open configuration file, using default values"
            );
            cfg.apply_defaults();
            events.push(ConfigEvent::MissingFile);
            return events;
        }
    };
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key_name, slot): (&'static str, &mut i32) = match key {
            "backlog" => ("backlog", &mut cfg.backlog),
            "max_clients" => ("max_clients", &mut cfg.max_clients),
            "sensor_period" => ("sensor_period", &mut cfg.sensor_period),
            "samples_moving_average_filter" => (
                "samples_moving_average_filter",
                &mut cfg.samples_moving_average_filter,
            ),
            _ => {
                tracing::warn!(key, "unknown configuration key");
                events.push(ConfigEvent::Unknown {
                    key: key.to_string(),
                });
                continue;
            }
        };
        match value.trim().parse::<i32>() {
            Ok(parsed) if parsed >= 1 => {
                if parsed == *slot {
                    // Unchanged: no-op, no warning.
                    continue;
                }
                *slot = parsed;
                tracing::info!(key = key_name, value = parsed, "configuration updated");
                events.push(ConfigEvent::Applied {
                    key: key_name,
                    value: parsed,
                });
            }
            _ => {
                tracing::warn!(key, value, "invalid configuration value, old value kept");
                events.push(ConfigEvent::Invalid {
                    key: key.to_string(),
                });
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn current() -> ServerConfig {
        ServerConfig {
            backlog: 3,
            max_clients: 10,
            sensor_period: 500,
            samples_moving_average_filter: 4,
            client_count: 7,
        }
    }

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn applies_changed_value() {
        let mut cfg = current();
        let file = write_file("backlog=5\n");
        let events = reload_from_file(file.path(), &mut cfg);
        assert_eq!(cfg.backlog, 5);
        assert_eq!(
            events,
            vec![ConfigEvent::Applied {
                key: "backlog",
                value: 5
            }]
        );
    }

    #[test]
    fn unparseable_value_keeps_prior_and_warns() {
        let mut cfg = current();
        let file = write_file("backlog=abc\n");
        let events = reload_from_file(file.path(), &mut cfg);
        assert_eq!(cfg.backlog, 3);
        assert_eq!(
            events,
            vec![ConfigEvent::Invalid {
                key: "backlog".into()
            }]
        );
    }

    #[test]
    fn zero_value_keeps_prior() {
        let mut cfg = current();
        let file = write_file("backlog=0\n");
        let events = reload_from_file(file.path(), &mut cfg);
        assert_eq!(cfg.backlog, 3);
        assert_eq!(
            events,
            vec![ConfigEvent::Invalid {
                key: "backlog".into()
            }]
        );
    }

    #[test]
    fn unchanged_value_is_a_silent_noop() {
        let mut cfg = current();
        let file = write_file("backlog=3\n");
        let events = reload_from_file(file.path(), &mut cfg);
        assert_eq!(cfg.backlog, 3);
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_key_is_reported_and_skipped() {
        let mut cfg = current();
        let file = write_file("turbo=9\nmax_clients=20\n");
        let events = reload_from_file(file.path(), &mut cfg);
        assert_eq!(cfg.max_clients, 20);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ConfigEvent::Unknown {
                key: "turbo".into()
            }
        );
    }

    #[test]
    fn separatorless_lines_are_ignored() {
        let mut cfg = current();
        let file = write_file("# comment\n\nbacklog 9\nsensor_period=750\n");
        let events = reload_from_file(file.path(), &mut cfg);
        assert_eq!(cfg.sensor_period, 750);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let mut cfg = current();
        let events = reload_from_file(Path::new("/nonexistent/iotmon.cfg"), &mut cfg);
        assert_eq!(cfg.backlog, DEFAULT_BACKLOG);
        assert_eq!(cfg.max_clients, DEFAULT_MAX_CLIENTS);
        assert_eq!(cfg.sensor_period, DEFAULT_SENSOR_PERIOD);
        assert_eq!(
            cfg.samples_moving_average_filter,
            DEFAULT_SAMPLES_MOVING_AVERAGE_FILTER
        );
        // Operational state is untouched by a config fallback.
        assert_eq!(cfg.client_count, 7);
        assert_eq!(events, vec![ConfigEvent::MissingFile]);
    }
}
