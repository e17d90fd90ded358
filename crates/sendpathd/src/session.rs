//! One connection, one thread, one strategy.
//!
//! A session owns its socket and its message for its whole lifetime; both are
//! released when [`Session::run`] returns, whatever the reason it stopped.

use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use sendpath_core::config::ZeroCopyConfig;
use sendpath_core::{SegmentedMessage, StrategyKind};

use crate::socket::TcpTransport;
use crate::transmit::{Budget, SessionEnd, SessionOutcome, Strategy};

/// What every session of a run does. Shared by value across threads.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub strategy: StrategyKind,
    pub message_size: usize,
    pub duration: Duration,
    pub zerocopy: ZeroCopyConfig,
}

pub struct Session {
    id: usize,
    peer: Option<SocketAddr>,
    transport: TcpTransport,
    plan: SessionPlan,
}

impl Session {
    pub fn new(id: usize, peer: Option<SocketAddr>, transport: TcpTransport, plan: SessionPlan) -> Self {
        Self {
            id,
            peer,
            transport,
            plan,
        }
    }

    /// Run on a dedicated named thread.
    pub fn spawn(self) -> Result<JoinHandle<SessionOutcome>> {
        let name = format!("session-{}", self.id);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .with_context(|| format!("failed to spawn {name}"))
    }

    /// Transmit until the budget expires or the peer goes away.
    pub fn run(self) -> SessionOutcome {
        let Session {
            id,
            peer,
            transport,
            plan,
        } = self;
        let peer = peer.map(|p| p.to_string()).unwrap_or_else(|| "unknown".into());

        let message = match SegmentedMessage::generate(plan.message_size) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(session = id, peer = %peer, error = %e, "cannot build message");
                return SessionOutcome::ended(SessionEnd::InvalidMessage);
            }
        };

        let mut strategy = Strategy::new(plan.strategy, message.len(), &plan.zerocopy);
        tracing::debug!(
            session = id,
            peer = %peer,
            strategy = %plan.strategy,
            message_size = message.len(),
            "session started"
        );

        let budget = Budget::start(plan.duration);
        let outcome = strategy.run(&transport, message, &budget);
        let elapsed = budget.elapsed();

        tracing::info!(
            session = id,
            peer = %peer,
            strategy = %plan.strategy,
            messages = outcome.messages,
            bytes = outcome.bytes,
            end = ?outcome.end,
            elapsed_ms = elapsed.as_millis() as u64,
            "session finished"
        );
        if let Some(zc) = &outcome.zerocopy {
            tracing::info!(
                session = id,
                enabled = zc.enabled,
                fell_back = zc.fell_back,
                submitted = zc.submitted,
                confirmed = zc.confirmed,
                copied = zc.copied,
                throttled = zc.throttled,
                drains = zc.drains,
                leaked = zc.leaked,
                "zero-copy completions"
            );
        }

        // Closes the socket.
        drop(transport);
        outcome
    }
}
