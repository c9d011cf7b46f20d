use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use iotmon_ipc::{IpcError, ResourceError, Semaphore, SharedArena};
use iotmon_signal::SignalError;
use nix::sys::signal::{SaFlags, Signal};

use crate::config::{self, ServerConfig};
use crate::http::{self, ConnDirective, Method, Mime, Request, Response, Status};

/// Key ids for the deployment's shared objects. Any process combining these
/// with the same key path reaches the same kernel objects.
pub const ARENA_KEY_ID: i32 = 123;
pub const GUARD_KEY_ID: i32 = 124;
pub const SAMPLE_QUEUE_KEY_ID: i32 = 125;

/// The reload signal. Delivery may interrupt a blocking `accept(2)`; the
/// loop treats `EINTR` as "go check the flag".
pub const RELOAD_SIGNAL: Signal = Signal::SIGUSR1;

/// The single piece of state shared between the signal handler and ordinary
/// code. Starts `true` so the first accept cycle always loads configuration.
static RELOAD_PENDING: AtomicBool = AtomicBool::new(true);

/// The only side effect a reload delivery performs. The actual file I/O
/// happens in [`HttpEngine::poll_reload`], between connections, where
/// arbitrary syscalls are safe.
extern "C" fn reload_handler(_signal: libc::c_int) {
    RELOAD_PENDING.store(true, Ordering::Relaxed);
}

/// The protocol engine: parses requests, dispatches the fixed route table,
/// and reads/mutates deployment state through the shared arena, serializing
/// every read-modify-write through the guard semaphore.
pub struct HttpEngine {
    arena: SharedArena<ServerConfig>,
    guard: Semaphore,
    config_file: PathBuf,
    web_root: PathBuf,
}

impl HttpEngine {
    /// Attach-or-create the deployment's arena and guard semaphore: the
    /// first process to start becomes the creator, everyone else attaches.
    pub fn new(
        key_path: &Path,
        config_file: PathBuf,
        web_root: PathBuf,
    ) -> Result<Self, ResourceError> {
        let arena = match SharedArena::create(key_path, ARENA_KEY_ID, 1) {
            Ok(arena) => {
                // Freshly created segments are kernel-zeroed; make the
                // pre-first-load state explicit all the same.
                arena.store(0, ServerConfig::zeroed());
                arena
            }
            Err(ResourceError::AlreadyExists { .. }) => {
                SharedArena::attach(key_path, ARENA_KEY_ID, 1)?
            }
            Err(e) => return Err(e),
        };
        let guard = match Semaphore::create(key_path, GUARD_KEY_ID) {
            Ok(guard) => guard,
            Err(ResourceError::AlreadyExists { .. }) => Semaphore::attach(key_path, GUARD_KEY_ID)?,
            Err(e) => return Err(e),
        };
        RELOAD_PENDING.store(true, Ordering::Relaxed);
        Ok(Self {
            arena,
            guard,
            config_file,
            web_root,
        })
    }

    /// Registers the reload handler. Deliberately *without* `SA_RESTART`:
    /// the whole point is that delivery interrupts the blocking accept so
    /// the loop can run [`Self::poll_reload`] before the next connection.
    pub fn install_reload_handler() -> Result<(), SignalError> {
        iotmon_signal::install(RELOAD_SIGNAL, reload_handler, SaFlags::empty(), &[])
    }

    /// Called at the top of each accept cycle: if a reload is due, clears
    /// the flag and re-reads the configuration file into the arena.
    pub fn poll_reload(&self) {
        if RELOAD_PENDING.swap(false, Ordering::Relaxed) {
            self.reload_now();
        }
    }

    /// Performs the guarded configuration reload unconditionally.
    pub fn reload_now(&self) {
        if let Err(e) = self.locked(|cfg| {
            config::reload_from_file(&self.config_file, cfg);
        }) {
            tracing::warn!(error = %e, "configuration reload skipped");
        }
    }

    /// Point-in-time copy of the shared record.
    pub fn snapshot(&self) -> ServerConfig {
        self.arena.load(0)
    }

    /// Handles one accepted connection to completion: read, parse, dispatch,
    /// respond, until the peer closes or a read/parse failure ends the
    /// exchange. May run concurrently with other handlers and with the
    /// accept loop; all shared mutation goes through the guard semaphore.
    pub fn handle_connection<C: Read + Write>(&self, conn: &mut C) {
        let mut buf = [0u8; 4096];
        loop {
            let n = match conn.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            let req = match http::parse_request(&buf[..n]) {
                Ok(req) => req,
                Err(e) => {
                    tracing::debug!(error = %e, "malformed request line, dropping connection");
                    return;
                }
            };
            // `None` means "skip the response, await the next request".
            let Some(res) = self.dispatch(&req) else {
                continue;
            };
            let close = res.conn == ConnDirective::Close;
            let bytes = http::build_response(&self.web_root, res);
            if conn.write_all(&bytes).is_err() || close {
                return;
            }
        }
    }

    /// The fixed route table. Exact string match on the route; anything
    /// unmatched is the 404 response.
    fn dispatch(&self, req: &Request) -> Option<Response> {
        match (req.method, req.route.as_str()) {
            (Method::Get, "/") => {
                if let Err(e) = self.locked(|cfg| cfg.client_count += 1) {
                    tracing::warn!(error = %e, "client counter increment lost");
                }
                Some(Response {
                    target: "/index.html".to_string(),
                    mime: Mime::Html,
                    status: Status::Ok,
                    conn: ConnDirective::Close,
                })
            }
            (Method::Get, "/images/favicon.ico") => Some(Response {
                target: req.route.clone(),
                mime: Mime::Icon,
                status: Status::Ok,
                conn: ConnDirective::Close,
            }),
            (Method::Get, "/images/404.jpg") => Some(Response {
                target: req.route.clone(),
                mime: Mime::Jpeg,
                status: Status::Ok,
                conn: ConnDirective::Close,
            }),
            (Method::Get, "/update") => {
                let cfg = self.snapshot();
                Some(Response {
                    target: format_update_body(&cfg),
                    mime: Mime::Json,
                    status: Status::Ok,
                    conn: ConnDirective::Close,
                })
            }
            (Method::Post, "/dc") => {
                if let Err(e) = self.locked(|cfg| {
                    if cfg.client_count > 0 {
                        cfg.client_count -= 1;
                    }
                }) {
                    tracing::warn!(error = %e, "client counter decrement lost");
                }
                None
            }
            _ => Some(Response::not_found()),
        }
    }

    /// Serialized read-modify-write of the shared record. Every mutation of
    /// the client counter goes through here; a lost update between
    /// concurrent workers is a correctness bug, not a tolerable race.
    fn locked<R>(&self, f: impl FnOnce(&mut ServerConfig) -> R) -> Result<R, IpcError> {
        self.guard.apply(-1)?;
        let out = self.arena.update(0, f);
        self.guard.apply(1)?;
        Ok(out)
    }
}

/// The synthesized `/update` body. Byte-exact format, spacing included: the
/// operator dashboard parses it as-is.
fn format_update_body(cfg: &ServerConfig) -> String {
    format!(
        "{{\"backlog\": {},\"max_clients\": {},\"sensor_period\": {},\"samples_moving_average_filter\": {},\"clients\": {}}}",
        cfg.backlog,
        cfg.max_clients,
        cfg.sensor_period,
        cfg.samples_moving_average_filter,
        cfg.client_count,
    )
}
