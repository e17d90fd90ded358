//! In-memory transport for strategy tests.
//!
//! Behaves like a connected socket whose peer stops reading after
//! `capacity` bytes, plus a toy kernel that pins zero-copy sends and
//! releases them in one coalesced range whenever the error queue is polled.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::time::Duration;

use super::Transport;
use crate::completion::{ErrorQueue, Notification};

pub struct FakeTransport {
    inner: RefCell<Inner>,
}

struct Inner {
    wire: Vec<u8>,
    capacity: usize,
    max_per_call: usize,
    eof_as_zero: bool,
    injected: VecDeque<i32>,
    always_fail: Option<i32>,
    sends: u64,

    zerocopy_supported: bool,
    zerocopy_enabled: bool,
    report_completions: bool,
    kernel_copies: bool,
    next_seq: u32,
    in_flight: VecDeque<u32>,
    max_in_flight: usize,
    queued: VecDeque<Notification>,
    zerocopy_sends: u64,
    flagged_sends: u64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner {
                wire: Vec::new(),
                capacity: usize::MAX,
                max_per_call: usize::MAX,
                eof_as_zero: false,
                injected: VecDeque::new(),
                always_fail: None,
                sends: 0,
                zerocopy_supported: true,
                zerocopy_enabled: false,
                report_completions: true,
                kernel_copies: false,
                next_seq: 0,
                in_flight: VecDeque::new(),
                max_in_flight: 0,
                queued: VecDeque::new(),
                zerocopy_sends: 0,
                flagged_sends: 0,
            }),
        }
    }

    /// Bytes accepted before the peer is gone (EPIPE).
    pub fn with_capacity(self, capacity: usize) -> Self {
        self.inner.borrow_mut().capacity = capacity;
        self
    }

    /// Upper bound on bytes accepted per call, to force short sends.
    pub fn with_max_per_call(self, max: usize) -> Self {
        self.inner.borrow_mut().max_per_call = max;
        self
    }

    /// Report a gone peer as a zero-byte send instead of EPIPE.
    pub fn eof_as_zero(self) -> Self {
        self.inner.borrow_mut().eof_as_zero = true;
        self
    }

    /// errno values returned, in order, by the next send calls.
    pub fn inject(self, errnos: impl IntoIterator<Item = i32>) -> Self {
        self.inner.borrow_mut().injected.extend(errnos);
        self
    }

    pub fn always_fail_with(self, errno: i32) -> Self {
        self.inner.borrow_mut().always_fail = Some(errno);
        self
    }

    pub fn without_zerocopy(self) -> Self {
        self.inner.borrow_mut().zerocopy_supported = false;
        self
    }

    /// The kernel never posts completions.
    pub fn silent_kernel(self) -> Self {
        self.inner.borrow_mut().report_completions = false;
        self
    }

    /// Completions carry the "copied" code.
    pub fn kernel_copies(self) -> Self {
        self.inner.borrow_mut().kernel_copies = true;
        self
    }

    pub fn wire(&self) -> Vec<u8> {
        self.inner.borrow().wire.clone()
    }

    /// Successful send calls of any kind.
    pub fn sends(&self) -> u64 {
        self.inner.borrow().sends
    }

    /// Sends the kernel pinned for zero-copy.
    pub fn zerocopy_sends(&self) -> u64 {
        self.inner.borrow().zerocopy_sends
    }

    /// Calls carrying MSG_ZEROCOPY, pinned or not.
    pub fn flagged_sends(&self) -> u64 {
        self.inner.borrow().flagged_sends
    }

    pub fn in_flight(&self) -> usize {
        self.inner.borrow().in_flight.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.borrow().max_in_flight
    }

    fn accept(&self, bufs: &[IoSlice<'_>], zerocopy: bool) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        if let Some(errno) = inner.injected.pop_front().or(inner.always_fail) {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if zerocopy {
            inner.flagged_sends += 1;
        }

        let room = inner.capacity.saturating_sub(inner.wire.len());
        if room == 0 {
            return if inner.eof_as_zero {
                Ok(0)
            } else {
                Err(io::Error::from_raw_os_error(libc::EPIPE))
            };
        }

        let requested: usize = bufs.iter().map(|b| b.len()).sum();
        let mut budget = requested.min(inner.max_per_call).min(room);
        let accepted = budget;
        for buf in bufs {
            if budget == 0 {
                break;
            }
            let take = buf.len().min(budget);
            inner.wire.extend_from_slice(&buf[..take]);
            budget -= take;
        }
        inner.sends += 1;

        if zerocopy && inner.zerocopy_enabled && accepted > 0 {
            let seq = inner.next_seq;
            inner.next_seq = seq.wrapping_add(1);
            inner.in_flight.push_back(seq);
            inner.zerocopy_sends += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight.len());
        }
        Ok(accepted)
    }
}

impl Transport for FakeTransport {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.accept(&[IoSlice::new(buf)], false)
    }

    fn send_vectored(&self, bufs: &[IoSlice<'_>], zerocopy: bool) -> io::Result<usize> {
        self.accept(bufs, zerocopy)
    }

    fn enable_zerocopy(&self) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.zerocopy_supported {
            return Err(io::Error::from_raw_os_error(libc::ENOPROTOOPT));
        }
        inner.zerocopy_enabled = true;
        Ok(())
    }
}

impl ErrorQueue for FakeTransport {
    fn wait_readable(&self, _timeout: Duration) -> io::Result<bool> {
        let mut inner = self.inner.borrow_mut();
        if inner.report_completions {
            let range = inner.in_flight.front().copied().zip(inner.in_flight.back().copied());
            if let Some((lo, hi)) = range {
                let copied = inner.kernel_copies;
                inner.in_flight.clear();
                inner.queued.push_back(Notification::ZeroCopy { lo, hi, copied });
            }
        }
        Ok(!inner.queued.is_empty())
    }

    fn recv_notification(&self) -> io::Result<Option<Notification>> {
        Ok(self.inner.borrow_mut().queued.pop_front())
    }
}
