use containers::{Commitment, Signature};

/// First signature of the EVM loader history on devnet. Scanning stops here.
pub const DEVNET_HISTORY_START: &str =
    "7BdwyUQ61RUZP63HABJkbW66beLk22tdXnP69KsvQBJekCPVaHoJY47Rw68b3VV1UbQNHxX3uxUSLfiJrfy2bTn";

pub const HISTORY_START: &[&str] = &[DEVNET_HISTORY_START];

/// Commitment for signature scans and the scan upper bound.
pub const SCAN_COMMITMENT: Commitment = Commitment::Confirmed;
/// Commitment for the block-sync ceiling. Lower latency, small reorg risk.
pub const HEAD_COMMITMENT: Commitment = Commitment::Recent;
/// Commitment for transaction bodies and block metadata.
pub const FETCH_COMMITMENT: Commitment = Commitment::Confirmed;
/// Commitment used to resolve `StartSlot::Latest`.
pub const START_COMMITMENT: Commitment = Commitment::Finalized;

#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub scan_commitment: Commitment,
    pub head_commitment: Commitment,
    pub fetch_commitment: Commitment,
    pub start_commitment: Commitment,
    /// Signatures marking the start of relevant history.
    pub history_start: Vec<Signature>,
}

impl ChainConfig {
    /// Devnet defaults plus any extra sentinels.
    pub fn devnet() -> Self {
        Self {
            scan_commitment: SCAN_COMMITMENT,
            head_commitment: HEAD_COMMITMENT,
            fetch_commitment: FETCH_COMMITMENT,
            start_commitment: START_COMMITMENT,
            history_start: HISTORY_START
                .iter()
                .filter_map(|raw| raw.parse().ok())
                .collect(),
        }
    }

    pub fn with_history_start(mut self, extra: impl IntoIterator<Item = Signature>) -> Self {
        for sig in extra {
            if !self.history_start.contains(&sig) {
                self.history_start.push(sig);
            }
        }
        self
    }

    pub fn is_history_start(&self, signature: &Signature) -> bool {
        self.history_start.contains(signature)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::devnet()
    }
}
