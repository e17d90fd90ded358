//! Zero-copy path: sendmsg(2) with MSG_ZEROCOPY and error-queue completions.
//!
//! ```text
//!   Ready ──► Sending ──► Done
//!               │  ▲        ▲
//!      ENOBUFS/ │  │ drain  │ budget expired
//!      EAGAIN   ▼  │        │
//!             Throttled ────┘
//! ```
//!
//! The segments are lent to the kernel for the whole session. They are
//! never written after generation, and freed only once the tracker reports
//! every send confirmed.

use std::io::{self, IoSlice};

use sendpath_core::config::ZeroCopyConfig;
use sendpath_core::SegmentedMessage;

use super::{Budget, GatherSend, SessionEnd, SessionOutcome, Transport};
use crate::completion::{CompletionTracker, ErrorQueue, LentMessage, Reclaim};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroCopyState {
    Ready,
    Sending,
    Throttled,
    Done,
}

impl ZeroCopyState {
    pub fn can_transition_to(self, next: ZeroCopyState) -> bool {
        use ZeroCopyState::*;
        matches!(
            (self, next),
            (Ready, Sending)
                | (Ready, Done)
                | (Sending, Throttled)
                | (Sending, Done)
                | (Throttled, Sending)
                | (Throttled, Done)
        )
    }
}

/// What the zero-copy path did over one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZeroCopyStats {
    /// SO_ZEROCOPY was accepted by the socket.
    pub enabled: bool,
    /// The session ran as a plain gather send instead.
    pub fell_back: bool,
    pub submitted: u64,
    pub confirmed: u64,
    /// Completions where the kernel copied after all.
    pub copied: u64,
    /// Retryable send failures.
    pub throttled: u64,
    pub drains: u64,
    /// Segments could not be confirmed at session end and were not freed.
    pub leaked: bool,
}

#[derive(Debug)]
pub struct ZeroCopy {
    config: ZeroCopyConfig,
    state: ZeroCopyState,
}

impl ZeroCopy {
    pub fn new(config: ZeroCopyConfig) -> Self {
        Self {
            config,
            state: ZeroCopyState::Ready,
        }
    }

    pub fn state(&self) -> ZeroCopyState {
        self.state
    }

    fn transition(&mut self, next: ZeroCopyState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid zero-copy transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "zero-copy state");
        self.state = next;
    }

    pub fn run<T>(&mut self, transport: &T, message: SegmentedMessage, budget: &Budget) -> SessionOutcome
    where
        T: Transport + ErrorQueue + ?Sized,
    {
        let enabled = match transport.enable_zerocopy() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = self.config.fallback_to_gather,
                    "failed to enable SO_ZEROCOPY"
                );
                false
            }
        };

        if !enabled && self.config.fallback_to_gather {
            let mut outcome = GatherSend.run(transport, &message, budget);
            self.transition(ZeroCopyState::Done);
            outcome.zerocopy = Some(ZeroCopyStats {
                fell_back: true,
                ..ZeroCopyStats::default()
            });
            return outcome;
        }

        let lent = LentMessage::lend(message);
        let mut tracker = CompletionTracker::new(self.config.poll_timeout());
        let mut outcome = SessionOutcome::ended(SessionEnd::BudgetExpired);
        let mut throttled = 0;

        outcome.end = loop {
            if budget.expired() {
                break SessionEnd::BudgetExpired;
            }
            self.transition(ZeroCopyState::Sending);
            match self.send_message(
                transport,
                lent.message(),
                enabled,
                &mut tracker,
                budget,
                &mut outcome.bytes,
                &mut throttled,
            ) {
                Ok(()) => outcome.messages += 1,
                Err(end) => break end,
            }
        };
        self.transition(ZeroCopyState::Done);

        let settled = tracker.final_drain(transport, self.config.final_drain_timeout());
        let mut stats = ZeroCopyStats {
            enabled,
            fell_back: false,
            submitted: tracker.submitted(),
            confirmed: tracker.confirmed(),
            copied: tracker.copied(),
            throttled,
            drains: tracker.drains(),
            leaked: false,
        };

        match lent.reclaim(&tracker) {
            Reclaim::Returned(message) => drop(message),
            Reclaim::Leaked { outstanding } => {
                tracing::warn!(
                    outstanding,
                    settled,
                    "zero-copy sends unconfirmed at session end, leaking segment buffers"
                );
                stats.leaked = true;
            }
        }

        outcome.zerocopy = Some(stats);
        outcome
    }

    /// Send one message, resuming short sends. Retryable failures drain the
    /// error queue and retry the same remainder.
    #[allow(clippy::too_many_arguments)]
    fn send_message<T>(
        &mut self,
        transport: &T,
        message: &SegmentedMessage,
        enabled: bool,
        tracker: &mut CompletionTracker,
        budget: &Budget,
        bytes: &mut u64,
        throttled: &mut u64,
    ) -> Result<(), SessionEnd>
    where
        T: Transport + ErrorQueue + ?Sized,
    {
        let drain_interval = self.config.drain_interval();
        let mut slices = message.io_slices();
        let mut bufs: &mut [IoSlice<'_>] = &mut slices;
        let mut remaining = message.len();

        while remaining > 0 {
            match transport.send_vectored(bufs, true) {
                Ok(0) => return Err(SessionEnd::PeerClosed),
                Ok(n) => {
                    *bytes += n as u64;
                    remaining -= n;
                    IoSlice::advance_slices(&mut bufs, n);
                    if enabled {
                        tracker.record_submission();
                        if tracker.submitted() % drain_interval == 0 {
                            tracker.drain(transport);
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_retryable(&e) => {
                    self.transition(ZeroCopyState::Throttled);
                    *throttled += 1;
                    tracker.drain(transport);
                    if budget.expired() {
                        return Err(SessionEnd::BudgetExpired);
                    }
                    self.transition(ZeroCopyState::Sending);
                }
                Err(e) => {
                    tracing::debug!(error = %e, outstanding = tracker.outstanding(), "zero-copy send failed");
                    return Err(SessionEnd::SendFailed(e.kind()));
                }
            }
        }
        Ok(())
    }
}

/// Transient backpressure: the optmem budget for pinned pages (ENOBUFS) or
/// a full send buffer on a non-blocking socket (EAGAIN).
fn is_retryable(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(libc::ENOBUFS)
}
