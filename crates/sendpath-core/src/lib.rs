//! sendpath-core: shared types for the send-path copy benchmark.
//! The server and client crates both depend on this one.

pub mod args;
pub mod config;
pub mod message;
pub mod record;
pub mod sample;
pub mod strategy;

pub use message::{MessageError, SegmentedMessage, MAX_MESSAGE_SIZE, SEGMENT_COUNT};
pub use sample::{Report, Sample};
pub use strategy::StrategyKind;
