//! Thin accept-loop shim over `socket2`. Out-of-scope collaborator in the
//! design: the engine only ever sees a byte stream, and this module only
//! ever hands it one.

use std::io;
use std::net::{SocketAddr, TcpStream};

use socket2::{Domain, Protocol, Socket, Type};

use crate::engine::HttpEngine;

pub struct Listener {
    inner: Socket,
}

impl Listener {
    /// Binds a blocking TCP listener with the configured accept backlog.
    pub fn bind(addr: SocketAddr, backlog: i32) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;
        Ok(Self { inner: socket })
    }

    /// Blocks for the next connection. A signal delivery surfaces as
    /// `ErrorKind::Interrupted`; the accept loop treats that as its cue to
    /// re-check the reload flag, not as a failure.
    pub fn accept(&self) -> io::Result<TcpStream> {
        let (socket, _peer) = self.inner.accept()?;
        Ok(socket.into())
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "not an inet socket"))
    }
}

/// The blocking accept loop: reload check, accept, handle to completion.
/// Each accepted connection is handled on the calling thread; the engine
/// itself is safe to share with worker threads if the deployment adds them.
pub fn run(engine: &HttpEngine, listener: &Listener) -> ! {
    loop {
        engine.poll_reload();
        match listener.accept() {
            Ok(mut stream) => engine.handle_connection(&mut stream),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => tracing::error!(error = %e, "accept failed"),
        }
    }
}
