//! sendpath integration test harness.
//!
//! Tests in this crate run a real acceptor on 127.0.0.1 with an ephemeral
//! port and drive it with plain TCP clients from the same process. No root
//! or special network setup is needed.
//!
//!   cargo test --test integration
//!
//! Each test owns the server it starts; servers never share a port.

use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use sendpath_core::config::ZeroCopyConfig;
use sendpath_core::{SegmentedMessage, StrategyKind};
use sendpathd::{Acceptor, SessionOutcome, SessionPlan};

mod isolation;
mod loopback;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Extra time clients keep reading after the server's budget, so the
/// server side is the one that ends each session.
pub const CLIENT_SLACK: Duration = Duration::from_millis(750);

/// A server running `threads` sessions on its own thread.
pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Result<Vec<SessionOutcome>>>,
}

impl TestServer {
    pub fn start(strategy: StrategyKind, message_size: usize, threads: usize, duration: Duration) -> Result<Self> {
        let acceptor = Acceptor::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), 16)?;
        let addr = acceptor.local_addr()?;
        let plan = SessionPlan {
            strategy,
            message_size,
            duration,
            zerocopy: ZeroCopyConfig::default(),
        };
        let handle = thread::Builder::new()
            .name(format!("test-server-{}", addr.port()))
            .spawn(move || acceptor.serve(threads, &plan))
            .context("failed to spawn test server")?;
        Ok(Self { addr, handle })
    }

    pub fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect(self.addr).with_context(|| format!("connect to {}", self.addr))
    }

    /// Wait for every session and return their outcomes in accept order.
    pub fn finish(self) -> Result<Vec<SessionOutcome>> {
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))?
    }
}

/// One message exactly as the server generates it.
pub fn expected_message(message_size: usize) -> Vec<u8> {
    let message = SegmentedMessage::generate(message_size).expect("valid message size");
    message.segments().flat_map(|s| s.iter().copied()).collect()
}

/// Read one full message off the stream.
pub fn read_message(stream: &mut TcpStream, message_size: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; message_size];
    stream.read_exact(&mut buf).context("read first message")?;
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_expected_message_layout() {
    let msg = expected_message(1024);
    assert_eq!(msg.len(), 1024);
    for (i, chunk) in msg.chunks(128).enumerate() {
        assert!(chunk.iter().all(|&b| b == b'A' + i as u8), "segment {i}");
    }
}
