use std::collections::BTreeMap;

use ethereum_types::{Address, H256, U256};
use govsim_common::word_to_h256;
use serde::{Deserialize, Serialize};

/// Hypothetical post-write storage state: contract address to slot to
/// word. Owned by one simulation request and never persisted.
pub type StateOverride = BTreeMap<Address, BTreeMap<H256, H256>>;

/// Block parameters the simulator should pretend to run under.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOverride {
    /// Simulated block number.
    pub number: u64,
    /// Simulated block timestamp.
    pub timestamp: u64,
}

/// Everything an external simulator needs to rehearse one execution:
/// the call to make and the synthetic storage to make it under.
///
/// The bundle is a value; building one never mutates chain state, caches
/// or the input records.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBundle {
    /// Contract to call.
    pub target: Address,
    /// Sender of the simulated call.
    pub from: Address,
    /// Encoded call data.
    #[serde(with = "call_data_hex")]
    pub call_data: Vec<u8>,
    /// Block to simulate under, when the bundle forces time forward.
    pub block: Option<BlockOverride>,
    /// Storage words to overlay before executing.
    pub state: StateOverride,
    /// When set, ignore the rest and replay this historical transaction:
    /// the outcome is already final and deterministic.
    pub replay: Option<H256>,
}

impl OverrideBundle {
    /// A bundle that replays a historical transaction verbatim.
    pub fn replay_of(target: Address, from: Address, transaction_hash: H256) -> Self {
        Self {
            target,
            from,
            call_data: Vec::new(),
            block: None,
            state: StateOverride::new(),
            replay: Some(transaction_hash),
        }
    }
}

/// Accumulates storage writes during bundle construction, then freezes
/// into the immutable [`StateOverride`] map.
#[derive(Debug, Default)]
pub(crate) struct OverrideAccumulator {
    state: StateOverride,
}

impl OverrideAccumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records `contract.slot = word`.
    pub(crate) fn set_word(&mut self, contract: Address, slot: U256, word: U256) {
        self.state
            .entry(contract)
            .or_default()
            .insert(word_to_h256(slot), word_to_h256(word));
    }

    pub(crate) fn freeze(self) -> StateOverride {
        self.state
    }
}

mod call_data_hex {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}
