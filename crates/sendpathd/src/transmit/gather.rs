//! One-copy path: sendmsg(2) straight from the segment buffers.

use sendpath_core::SegmentedMessage;

use super::{send_vectored_all, Budget, SessionEnd, SessionOutcome, Transport};

/// No user-space copy; the kernel copies each byte once into the socket
/// buffer. Short sends are resumed like the two-copy path resumes them.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatherSend;

impl GatherSend {
    pub fn run<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        message: &SegmentedMessage,
        budget: &Budget,
    ) -> SessionOutcome {
        let mut outcome = SessionOutcome::ended(SessionEnd::BudgetExpired);
        outcome.end = loop {
            if budget.expired() {
                break SessionEnd::BudgetExpired;
            }
            match send_vectored_all(transport, message, &mut outcome.bytes) {
                Ok(()) => outcome.messages += 1,
                Err(stop) => break stop.into(),
            }
        };
        outcome
    }
}
