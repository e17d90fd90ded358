//! Listening socket and batch launch of sessions.
//!
//! The acceptor takes exactly as many connections as the run has threads,
//! starting each session as soon as its connection arrives, and then stops
//! accepting. A run is over once every session has returned.

use std::io;
use std::net::SocketAddr;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};

use crate::session::{Session, SessionPlan};
use crate::socket::TcpTransport;
use crate::transmit::SessionOutcome;

pub struct Acceptor {
    socket: Socket,
}

impl Acceptor {
    /// Create, configure, bind and listen. Every step is fatal on failure.
    pub fn bind(addr: SocketAddr, backlog: i32) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .context("socket()")?;
        socket.set_reuse_address(true).context("SO_REUSEADDR")?;
        socket.set_reuse_port(true).context("SO_REUSEPORT")?;
        socket
            .bind(&addr.into())
            .with_context(|| format!("failed to bind {addr}"))?;
        socket.listen(backlog).context("listen()")?;
        tracing::debug!(%addr, backlog, "listening");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("getsockname()")?
            .as_socket()
            .context("listener is not an inet socket")
    }

    /// Block for the next connection. EINTR is retried.
    pub fn accept(&self) -> Result<(Socket, Option<SocketAddr>)> {
        loop {
            match self.socket.accept() {
                Ok((socket, addr)) => return Ok((socket, addr.as_socket())),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("accept()"),
            }
        }
    }

    /// Accept `count` connections one after another, spawning a session
    /// thread for each.
    pub fn launch(&self, count: usize, plan: &SessionPlan) -> Result<Vec<JoinHandle<SessionOutcome>>> {
        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let (socket, peer) = self.accept()?;
            tracing::info!(session = id, peer = ?peer, "connection accepted");
            let session = Session::new(id, peer, TcpTransport::new(socket), plan.clone());
            handles.push(session.spawn()?);
        }
        Ok(handles)
    }

    /// [`launch`](Self::launch) and wait for every session.
    ///
    /// A session thread that panicked is logged and left out of the result.
    pub fn serve(&self, count: usize, plan: &SessionPlan) -> Result<Vec<SessionOutcome>> {
        let handles = self.launch(count, plan)?;
        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => tracing::error!(session = id, "session thread panicked"),
            }
        }
        Ok(outcomes)
    }
}
