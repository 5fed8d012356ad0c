use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Position in the remote ledger's block sequence.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Slot(pub u64);

impl Slot {
    pub const ZERO: Slot = Slot(0);

    /// Slot `count` positions after this one, saturating at `u64::MAX`.
    pub fn saturating_add(self, count: u64) -> Slot {
        Slot(self.0.saturating_add(count))
    }

    /// Previous slot, or `None` at genesis.
    pub fn prev(self) -> Option<Slot> {
        self.0.checked_sub(1).map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Slot {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Slot)
    }
}

impl From<u64> for Slot {
    fn from(value: u64) -> Self {
        Slot(value)
    }
}

/// Where the transaction cursor starts when the indexer boots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StartSlot {
    /// Resume from the persisted cursor (0 on a fresh store).
    #[default]
    Continue,
    /// Skip history and start at the remote's current finalized slot.
    Latest,
    /// Start at an explicit slot.
    Exact(Slot),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported start slot `{0}`: must be an integer or one of [CONTINUE, LATEST]")]
pub struct InvalidStartSlot(pub String);

impl FromStr for StartSlot {
    type Err = InvalidStartSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CONTINUE" | "continue" => Ok(StartSlot::Continue),
            "LATEST" | "latest" => Ok(StartSlot::Latest),
            other => other
                .parse::<u64>()
                .map(|slot| StartSlot::Exact(Slot(slot)))
                .map_err(|_| InvalidStartSlot(other.to_string())),
        }
    }
}

impl fmt::Display for StartSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartSlot::Continue => write!(f, "CONTINUE"),
            StartSlot::Latest => write!(f, "LATEST"),
            StartSlot::Exact(slot) => write!(f, "{slot}"),
        }
    }
}
