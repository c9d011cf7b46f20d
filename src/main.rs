use std::net::SocketAddr;
use std::path::PathBuf;

use iotmon::engine::HttpEngine;
use iotmon::net::{self, Listener};

/// Bootstrap: `iotmon [bind-addr] [config-file] [web-root]`.
///
/// The first process to start creates the shared arena and guard semaphore;
/// later siblings attach. Send `SIGUSR1` to hot-reload the configuration
/// file without restarting.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
        .parse()?;
    let config_file = PathBuf::from(args.next().unwrap_or_else(|| "config.cfg".to_string()));
    let web_root = PathBuf::from(args.next().unwrap_or_else(|| "web".to_string()));

    HttpEngine::install_reload_handler()?;
    let engine = HttpEngine::new(std::path::Path::new("."), config_file, web_root)?;

    // The flag starts raised, so this performs the initial load and gives
    // the listener a configured backlog to start from.
    engine.poll_reload();
    let listener = Listener::bind(addr, engine.snapshot().backlog)?;

    tracing::info!(
        pid = std::process::id(),
        addr = %listener.local_addr()?,
        "server up"
    );
    net::run(&engine, &listener)
}
