//! iotmon: an embedded monitoring server whose operational state lives in a
//! named shared memory record, hot-reloadable by signal.
//!
//! The HTTP surface is deliberately small: a fixed route table over a
//! blocking per-connection loop. The substance is underneath, in
//! `iotmon-ipc` and `iotmon-signal`: strict create-vs-attach shared objects,
//! creator-only teardown, a counting semaphore serializing every
//! cross-process read-modify-write, and a reload signal that only ever sets
//! a flag, observed between accepts.

pub mod config;
pub mod engine;
pub mod http;
pub mod net;
pub mod sampling;

pub use config::ServerConfig;
pub use engine::HttpEngine;
