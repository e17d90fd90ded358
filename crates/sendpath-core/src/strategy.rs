//! Transmit strategy selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which send path a server session uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Linearize the segments into a scratch buffer, then `send()` it.
    /// Two copies per byte: user space and kernel.
    #[default]
    CopyLinearize,
    /// One `sendmsg()` over the segment list. One kernel copy per byte.
    GatherSend,
    /// `sendmsg(MSG_ZEROCOPY)` with error-queue completion tracking.
    ZeroCopy,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::CopyLinearize,
        StrategyKind::GatherSend,
        StrategyKind::ZeroCopy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::CopyLinearize => "copy_linearize",
            StrategyKind::GatherSend => "gather_send",
            StrategyKind::ZeroCopy => "zero_copy",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown strategy '{0}' (expected copy_linearize, gather_send or zero_copy)")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy_linearize" | "copy" | "two-copy" | "a1" => Ok(StrategyKind::CopyLinearize),
            "gather_send" | "gather" | "one-copy" | "a2" => Ok(StrategyKind::GatherSend),
            "zero_copy" | "zerocopy" | "zero-copy" | "a3" => Ok(StrategyKind::ZeroCopy),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
