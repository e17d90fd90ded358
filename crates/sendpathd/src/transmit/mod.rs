//! Transmit strategies: three ways of putting a segmented message on a
//! connected TCP socket, from most copying to least.
//!
//! All three loop until the session budget runs out or the peer goes away.
//! A send error is never fatal to the process; it ends the session and is
//! reported in the [`SessionOutcome`].

pub mod copy;
pub mod gather;
pub mod zerocopy;

#[cfg(test)]
pub(crate) mod fake;

use std::io::{self, IoSlice};
use std::time::{Duration, Instant};

use sendpath_core::config::ZeroCopyConfig;
use sendpath_core::{SegmentedMessage, StrategyKind};

use crate::completion::ErrorQueue;

pub use copy::CopyLinearize;
pub use gather::GatherSend;
pub use zerocopy::{ZeroCopy, ZeroCopyState, ZeroCopyStats};

/// The send side of a connected stream socket.
pub trait Transport {
    /// One send(2) from a contiguous buffer.
    fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// One sendmsg(2) over a gather list. With `zerocopy` the call carries
    /// MSG_ZEROCOPY and the kernel may keep referencing `bufs` after it
    /// returns.
    fn send_vectored(&self, bufs: &[IoSlice<'_>], zerocopy: bool) -> io::Result<usize>;

    /// Opt the socket into zero-copy sends (SO_ZEROCOPY).
    fn enable_zerocopy(&self) -> io::Result<()>;
}

/// Wall-clock allowance for one session. Checked once per message.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Duration,
}

impl Budget {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Why a session stopped sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    BudgetExpired,
    /// A send accepted zero bytes.
    PeerClosed,
    SendFailed(io::ErrorKind),
    /// The payload could not be built.
    InvalidMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Messages handed to the kernel in full.
    pub messages: u64,
    /// Bytes the kernel accepted, partial messages included.
    pub bytes: u64,
    pub end: SessionEnd,
    /// Only set by the zero-copy strategy.
    pub zerocopy: Option<ZeroCopyStats>,
}

impl SessionOutcome {
    pub fn ended(end: SessionEnd) -> Self {
        Self {
            messages: 0,
            bytes: 0,
            end,
            zerocopy: None,
        }
    }
}

/// A send loop gave up on the current message.
#[derive(Debug)]
pub(crate) enum SendStop {
    PeerClosed,
    Failed(io::Error),
}

impl From<SendStop> for SessionEnd {
    fn from(stop: SendStop) -> Self {
        match stop {
            SendStop::PeerClosed => SessionEnd::PeerClosed,
            SendStop::Failed(e) => SessionEnd::SendFailed(e.kind()),
        }
    }
}

/// Send the whole gather list, resuming short sends where they stopped.
pub(crate) fn send_vectored_all<T: Transport + ?Sized>(
    transport: &T,
    message: &SegmentedMessage,
    bytes: &mut u64,
) -> Result<(), SendStop> {
    let mut slices = message.io_slices();
    let mut bufs: &mut [IoSlice<'_>] = &mut slices;
    let mut remaining = message.len();

    while remaining > 0 {
        match transport.send_vectored(bufs, false) {
            Ok(0) => return Err(SendStop::PeerClosed),
            Ok(n) => {
                *bytes += n as u64;
                remaining -= n;
                IoSlice::advance_slices(&mut bufs, n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "gather send failed");
                return Err(SendStop::Failed(e));
            }
        }
    }
    Ok(())
}

/// A session's send path, chosen once at session start.
#[derive(Debug)]
pub enum Strategy {
    CopyLinearize(CopyLinearize),
    GatherSend(GatherSend),
    ZeroCopy(ZeroCopy),
}

impl Strategy {
    pub fn new(kind: StrategyKind, message_len: usize, zerocopy: &ZeroCopyConfig) -> Self {
        match kind {
            StrategyKind::CopyLinearize => Strategy::CopyLinearize(CopyLinearize::new(message_len)),
            StrategyKind::GatherSend => Strategy::GatherSend(GatherSend),
            StrategyKind::ZeroCopy => Strategy::ZeroCopy(ZeroCopy::new(zerocopy.clone())),
        }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> StrategyKind {
        match self {
            Strategy::CopyLinearize(_) => StrategyKind::CopyLinearize,
            Strategy::GatherSend(_) => StrategyKind::GatherSend,
            Strategy::ZeroCopy(_) => StrategyKind::ZeroCopy,
        }
    }

    /// Transmit `message` until the budget runs out or the peer goes away.
    ///
    /// Takes the message by value: the zero-copy path decides for itself when
    /// the segments may be freed.
    pub fn run<T>(&mut self, transport: &T, message: SegmentedMessage, budget: &Budget) -> SessionOutcome
    where
        T: Transport + ErrorQueue,
    {
        match self {
            Strategy::CopyLinearize(s) => s.run(transport, &message, budget),
            Strategy::GatherSend(s) => s.run(transport, &message, budget),
            Strategy::ZeroCopy(s) => s.run(transport, message, budget),
        }
    }
}
