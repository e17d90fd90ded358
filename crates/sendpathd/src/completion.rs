//! Zero-copy completion tracking.
//!
//! With MSG_ZEROCOPY the kernel pins the caller's pages and sends from them
//! after sendmsg(2) has returned. Once it is done it queues a notification on
//! the socket error queue covering a range of send sequence numbers. The
//! kernel numbers every accepted zero-copy sendmsg call from zero, so a
//! plain submitted/confirmed pair of counters is enough to know how many
//! sends are still outstanding; no per-buffer bookkeeping is needed.
//!
//! The segments themselves are held in a [`LentMessage`] for as long as the
//! kernel may read them. It only gives memory back when the tracker reports
//! nothing outstanding.

use std::io;
use std::mem::ManuallyDrop;
use std::time::{Duration, Instant};

use sendpath_core::SegmentedMessage;

/// One record read from the socket error queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The kernel released sends `lo..=hi`. `copied` means it fell back to
    /// copying the data (loopback does this) instead of sending from the
    /// pinned pages.
    ZeroCopy { lo: u32, hi: u32, copied: bool },
    /// A queued error of some other origin.
    Other { origin: u8, errno: u32 },
    /// A record without a recognizable extended-error payload.
    Unrecognized,
}

impl Notification {
    /// Number of sends this record releases.
    pub fn released(&self) -> u64 {
        match self {
            Notification::ZeroCopy { lo, hi, .. } => u64::from(hi.wrapping_sub(*lo)) + 1,
            _ => 0,
        }
    }
}

/// The socket's error/notification channel.
pub trait ErrorQueue {
    /// Wait up to `timeout` for a queued record. `Ok(false)` on timeout.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    /// Dequeue one record without blocking. `Ok(None)` once the queue is empty.
    fn recv_notification(&self) -> io::Result<Option<Notification>>;
}

/// Counts zero-copy sends against the completions the kernel reports.
///
/// `confirmed` never exceeds `submitted`, so the outstanding count cannot
/// go negative even if the kernel reports a range we did not expect.
#[derive(Debug)]
pub struct CompletionTracker {
    submitted: u64,
    confirmed: u64,
    copied: u64,
    drains: u64,
    next_seq: u32,
    poll_timeout: Duration,
}

impl CompletionTracker {
    pub fn new(poll_timeout: Duration) -> Self {
        Self {
            submitted: 0,
            confirmed: 0,
            copied: 0,
            drains: 0,
            next_seq: 0,
            poll_timeout,
        }
    }

    /// Count one accepted zero-copy sendmsg call.
    pub fn record_submission(&mut self) {
        self.submitted += 1;
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    /// Completions the kernel flagged as copied rather than zero-copy.
    pub fn copied(&self) -> u64 {
        self.copied
    }

    pub fn drains(&self) -> u64 {
        self.drains
    }

    /// Sends the kernel may still be reading from.
    pub fn outstanding(&self) -> u64 {
        self.submitted - self.confirmed
    }

    /// Apply one notification. Returns how many sends it confirmed.
    pub fn confirm(&mut self, notification: Notification) -> u64 {
        match notification {
            Notification::ZeroCopy { lo, hi, copied } => {
                if lo != self.next_seq {
                    tracing::debug!(expected = self.next_seq, lo, hi, "completion range out of sequence");
                }
                self.next_seq = hi.wrapping_add(1);

                let released = notification.released();
                let count = released.min(self.outstanding());
                if count < released {
                    tracing::warn!(
                        released,
                        outstanding = self.outstanding(),
                        "kernel confirmed more sends than were submitted"
                    );
                }
                self.confirmed += count;
                if copied {
                    self.copied += count;
                }
                count
            }
            Notification::Other { origin, errno } => {
                tracing::debug!(origin, errno, "ignoring non zero-copy error queue record");
                0
            }
            Notification::Unrecognized => 0,
        }
    }

    /// One drain pass: short poll, then read every queued record.
    ///
    /// Poll and read errors count as "nothing available". Returns the number
    /// of sends confirmed by this pass.
    pub fn drain<Q: ErrorQueue + ?Sized>(&mut self, queue: &Q) -> u64 {
        self.drains += 1;
        if let Err(e) = queue.wait_readable(self.poll_timeout) {
            tracing::trace!(error = %e, "error queue poll failed");
            return 0;
        }

        let mut confirmed = 0;
        loop {
            match queue.recv_notification() {
                Ok(Some(n)) => confirmed += self.confirm(n),
                Ok(None) => break,
                Err(e) => {
                    tracing::trace!(error = %e, "error queue read failed");
                    break;
                }
            }
        }
        if confirmed > 0 {
            tracing::trace!(confirmed, outstanding = self.outstanding(), "completions drained");
        }
        confirmed
    }

    /// Drain until nothing is outstanding or `limit` has passed. Always runs
    /// at least one pass. Returns true if everything was confirmed.
    pub fn final_drain<Q: ErrorQueue + ?Sized>(&mut self, queue: &Q, limit: Duration) -> bool {
        let started = Instant::now();
        loop {
            self.drain(queue);
            if self.outstanding() == 0 {
                return true;
            }
            if started.elapsed() >= limit {
                return false;
            }
        }
    }
}

/// A message whose segments are on loan to the kernel.
///
/// The segments are only freed through [`LentMessage::reclaim`] against a
/// tracker with nothing outstanding. Dropping a `LentMessage` any other way
/// leaks them.
#[derive(Debug)]
pub struct LentMessage {
    message: ManuallyDrop<SegmentedMessage>,
}

/// Result of [`LentMessage::reclaim`].
#[derive(Debug)]
pub enum Reclaim {
    Returned(SegmentedMessage),
    /// The kernel may still read the segments; their memory was leaked.
    Leaked { outstanding: u64 },
}

impl LentMessage {
    pub fn lend(message: SegmentedMessage) -> Self {
        Self {
            message: ManuallyDrop::new(message),
        }
    }

    pub fn message(&self) -> &SegmentedMessage {
        &self.message
    }

    pub fn reclaim(mut self, tracker: &CompletionTracker) -> Reclaim {
        let outstanding = tracker.outstanding();
        if outstanding > 0 {
            return Reclaim::Leaked { outstanding };
        }
        // Safety: `self` is consumed and the field is never read again.
        let message = unsafe { ManuallyDrop::take(&mut self.message) };
        Reclaim::Returned(message)
    }
}
