use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::states::{PayloadState, ProposalState};

/// One call an executor will perform, as registered on-chain.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Contract the executor calls.
    pub target: Address,
    /// Whether the executor delegatecalls instead of calling.
    pub with_delegate_call: bool,
    /// Permission level the action requires.
    pub access_level: u8,
    /// Wei forwarded with the call.
    pub value: U256,
    /// Solidity function signature, empty when `call_data` already carries
    /// the selector.
    pub signature: String,
    /// Raw call data (without selector when `signature` is set).
    #[serde(with = "serde_bytes_hex")]
    pub call_data: Vec<u8>,
}

/// An executor payload record, read off-chain from the payloads controller.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Sequential payload id.
    pub id: u64,
    /// Account that registered the payload.
    pub creator: Address,
    /// Highest access level any of its actions requires.
    pub maximum_access_level: u8,
    /// Current lifecycle state.
    pub state: PayloadState,
    /// Registration timestamp.
    pub created_at: u64,
    /// Queueing timestamp, zero until queued.
    pub queued_at: u64,
    /// Execution timestamp, zero until executed.
    pub executed_at: u64,
    /// Cancellation timestamp, zero unless cancelled.
    pub cancelled_at: u64,
    /// Timestamp after which an unqueued payload can no longer be queued.
    pub expiration_time: u64,
    /// Timelock delay between queueing and earliest execution, seconds.
    pub delay: u64,
    /// Window after the delay during which execution stays valid, seconds.
    pub grace_period: u64,
    /// The calls the payload performs.
    pub actions: Vec<Action>,
    /// Transaction that executed the payload, for replaying finalized
    /// payloads.
    pub transaction_hash: Option<H256>,
}

/// A governance proposal record, read off-chain from the governance core.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Sequential proposal id.
    pub id: u64,
    /// Account that created the proposal.
    pub creator: Address,
    /// Permission level the proposal executes at.
    pub access_level: u8,
    /// Current lifecycle state.
    pub state: ProposalState,
    /// Creation timestamp.
    pub creation_time: u64,
    /// Voting window length, seconds.
    pub voting_duration: u32,
    /// Timestamp voting opened, zero until activated.
    pub voting_activation_time: u64,
    /// Timestamp the proposal was queued, zero until queued.
    pub queuing_time: u64,
    /// Cancellation timestamp, zero unless cancelled.
    pub cancel_timestamp: u64,
    /// Votes in favour.
    pub votes_for: U256,
    /// Votes against.
    pub votes_against: U256,
    /// Transaction that executed the proposal, for replays.
    pub transaction_hash: Option<H256>,
}


/// Hex (`0x`-prefixed) serde for call data bytes.
mod serde_bytes_hex {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}
