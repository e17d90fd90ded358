//! sendpathd: the sending side of the send-path benchmark.
//!
//! An [`acceptor::Acceptor`] hands each connection to a
//! [`session::Session`] running on its own thread; the session drives one
//! [`transmit::Strategy`] until its time budget runs out.

pub mod acceptor;
pub mod completion;
pub mod session;
pub mod socket;
pub mod transmit;

pub use acceptor::Acceptor;
pub use session::{Session, SessionPlan};
pub use transmit::{SessionEnd, SessionOutcome};
