//! Two-copy path: linearize in user space, then send(2).

use std::io;

use sendpath_core::SegmentedMessage;

use super::{Budget, SendStop, SessionEnd, SessionOutcome, Transport};

/// Copies the segments into one scratch buffer every iteration.
#[derive(Debug)]
pub struct CopyLinearize {
    scratch: Vec<u8>,
}

impl CopyLinearize {
    pub fn new(message_len: usize) -> Self {
        Self {
            scratch: vec![0u8; message_len],
        }
    }

    /// The buffer as of the last iteration.
    #[cfg(test)]
    pub(crate) fn scratch(&self) -> &[u8] {
        &self.scratch
    }

    pub fn run<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        message: &SegmentedMessage,
        budget: &Budget,
    ) -> SessionOutcome {
        let len = message.len();
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }

        let mut outcome = SessionOutcome::ended(SessionEnd::BudgetExpired);
        outcome.end = loop {
            if budget.expired() {
                break SessionEnd::BudgetExpired;
            }

            // Copy 1: user space.
            message.linearize_into(&mut self.scratch);

            // Copy 2: send(2) into the socket buffer.
            match send_all(transport, &self.scratch[..len], &mut outcome.bytes) {
                Ok(()) => outcome.messages += 1,
                Err(stop) => break stop.into(),
            }
        };
        outcome
    }
}

/// send(2) until every byte is accepted. The scratch buffer is not touched
/// in between, so a short send resumes from its offset.
fn send_all<T: Transport + ?Sized>(transport: &T, buf: &[u8], bytes: &mut u64) -> Result<(), SendStop> {
    let mut offset = 0;
    while offset < buf.len() {
        match transport.send(&buf[offset..]) {
            Ok(0) => return Err(SendStop::PeerClosed),
            Ok(n) => {
                offset += n;
                *bytes += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, offset, "send failed");
                return Err(SendStop::Failed(e));
            }
        }
    }
    Ok(())
}
