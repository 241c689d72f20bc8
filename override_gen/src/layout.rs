//! Storage layouts of the governance contracts whose state gets forged.
//!
//! Slot numbers and packed bit ranges are per-deployment knowledge: a
//! contract we have no layout for cannot be forced, only refused. The
//! registry is explicit and passed by reference wherever needed; there is
//! deliberately no process-global table.

use std::collections::BTreeMap;

use ethereum_types::{Address, H256, U256};
use hex_literal::hex;
use storage_layout::{
    dynamic_array_element_slot, mapping_slot_b256, mapping_slot_uint, PackedField, StorageSlot,
};

// Payload record, first packed word.
const PAYLOAD_CREATOR: PackedField = PackedField::new(0, 159);
const PAYLOAD_MAX_ACCESS_LEVEL: PackedField = PackedField::new(160, 167);
const PAYLOAD_STATE: PackedField = PackedField::new(168, 175);
const PAYLOAD_CREATED_AT: PackedField = PackedField::new(176, 215);
const PAYLOAD_QUEUED_AT: PackedField = PackedField::new(216, 255);

// Payload record, second packed word.
const PAYLOAD_EXECUTED_AT: PackedField = PackedField::new(0, 39);
const PAYLOAD_CANCELLED_AT: PackedField = PackedField::new(40, 79);
const PAYLOAD_EXPIRATION_TIME: PackedField = PackedField::new(80, 119);
const PAYLOAD_DELAY: PackedField = PackedField::new(120, 159);
const PAYLOAD_GRACE_PERIOD: PackedField = PackedField::new(160, 199);

// Proposal record, packed word.
const PROPOSAL_STATE: PackedField = PackedField::new(0, 7);
const PROPOSAL_ACCESS_LEVEL: PackedField = PackedField::new(8, 15);
const PROPOSAL_CREATION_TIME: PackedField = PackedField::new(16, 55);
const PROPOSAL_VOTING_DURATION: PackedField = PackedField::new(56, 79);
const PROPOSAL_VOTING_ACTIVATION_TIME: PackedField = PackedField::new(80, 119);
const PROPOSAL_QUEUING_TIME: PackedField = PackedField::new(120, 159);
const PROPOSAL_CANCEL_TIMESTAMP: PackedField = PackedField::new(160, 199);

// Action array element, first word. Members pack byte-aligned, so the
// bool owns the whole of byte 20 and the access-level enum byte 21.
const ACTION_TARGET: PackedField = PackedField::new(0, 159);
const ACTION_WITH_DELEGATE_CALL: PackedField = PackedField::new(160, 167);
const ACTION_ACCESS_LEVEL: PackedField = PackedField::new(168, 175);

fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

fn word_to_address(word: U256) -> Address {
    let mut buf = [0u8; 32];
    word.to_big_endian(&mut buf);
    Address::from_slice(&buf[12..])
}

/// Decoded fields of a payload's first packed word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PayloadWord0 {
    /// Account that registered the payload.
    pub creator: Address,
    /// Highest access level among the payload's actions.
    pub maximum_access_level: u8,
    /// Raw state byte; may fail to decode on unknown layouts.
    pub state: u8,
    /// Registration timestamp.
    pub created_at: u64,
    /// Queueing timestamp.
    pub queued_at: u64,
}

/// Decoded fields of a payload's second packed word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PayloadTimings {
    /// Execution timestamp.
    pub executed_at: u64,
    /// Cancellation timestamp.
    pub cancelled_at: u64,
    /// Deadline for queueing.
    pub expiration_time: u64,
    /// Timelock delay, seconds.
    pub delay: u64,
    /// Execution window after the delay, seconds.
    pub grace_period: u64,
}

/// Storage layout of a payloads-controller deployment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControllerLayout {
    /// Base slot of the `id => payload` mapping.
    pub payloads_mapping_slot: StorageSlot,
    /// Slot of the payload counter.
    pub payloads_count_slot: StorageSlot,
    /// Words one action element occupies in the actions array.
    pub action_word_size: u64,
    /// Executor contract per access level.
    pub executors: BTreeMap<u8, Address>,
}

impl ControllerLayout {
    /// First slot of the payload record for `id`.
    pub fn payload_base_slot(&self, id: u64) -> StorageSlot {
        mapping_slot_uint(self.payloads_mapping_slot, U256::from(id))
    }

    /// Slot of the actions array length word for `id`.
    pub fn actions_length_slot(&self, id: u64) -> StorageSlot {
        self.payload_base_slot(id) + U256::from(2)
    }

    /// Slot of word `word` of action element `index` for `id`.
    pub fn action_word_slot(&self, id: u64, index: u64, word: u64) -> StorageSlot {
        dynamic_array_element_slot(self.actions_length_slot(id), index, self.action_word_size)
            + U256::from(word)
    }

    /// Packs a payload's first storage word.
    pub fn encode_payload_word0(&self, fields: PayloadWord0) -> U256 {
        let mut word = U256::zero();
        word = PAYLOAD_CREATOR.set(word, address_to_word(fields.creator));
        word = PAYLOAD_MAX_ACCESS_LEVEL.set(word, fields.maximum_access_level.into());
        word = PAYLOAD_STATE.set(word, fields.state.into());
        word = PAYLOAD_CREATED_AT.set(word, fields.created_at.into());
        word = PAYLOAD_QUEUED_AT.set(word, fields.queued_at.into());
        word
    }

    /// Unpacks a payload's first storage word.
    pub fn decode_payload_word0(&self, word: U256) -> PayloadWord0 {
        PayloadWord0 {
            creator: word_to_address(PAYLOAD_CREATOR.get(word)),
            maximum_access_level: PAYLOAD_MAX_ACCESS_LEVEL.get(word).low_u64() as u8,
            state: PAYLOAD_STATE.get(word).low_u64() as u8,
            created_at: PAYLOAD_CREATED_AT.get(word).low_u64(),
            queued_at: PAYLOAD_QUEUED_AT.get(word).low_u64(),
        }
    }

    /// Rewrites only the state and queued-at fields of an existing first
    /// word, leaving creator, access level and created-at untouched.
    pub fn requeue_payload_word0(&self, word: U256, state: u8, queued_at: u64) -> U256 {
        PAYLOAD_QUEUED_AT.set(PAYLOAD_STATE.set(word, state.into()), queued_at.into())
    }

    /// Packs a payload's second storage word.
    pub fn encode_payload_timings(&self, timings: PayloadTimings) -> U256 {
        let mut word = U256::zero();
        word = PAYLOAD_EXECUTED_AT.set(word, timings.executed_at.into());
        word = PAYLOAD_CANCELLED_AT.set(word, timings.cancelled_at.into());
        word = PAYLOAD_EXPIRATION_TIME.set(word, timings.expiration_time.into());
        word = PAYLOAD_DELAY.set(word, timings.delay.into());
        word = PAYLOAD_GRACE_PERIOD.set(word, timings.grace_period.into());
        word
    }

    /// Unpacks a payload's second storage word.
    pub fn decode_payload_timings(&self, word: U256) -> PayloadTimings {
        PayloadTimings {
            executed_at: PAYLOAD_EXECUTED_AT.get(word).low_u64(),
            cancelled_at: PAYLOAD_CANCELLED_AT.get(word).low_u64(),
            expiration_time: PAYLOAD_EXPIRATION_TIME.get(word).low_u64(),
            delay: PAYLOAD_DELAY.get(word).low_u64(),
            grace_period: PAYLOAD_GRACE_PERIOD.get(word).low_u64(),
        }
    }

    /// Packs one action into its first element word.
    pub fn encode_action_word0(
        &self,
        target: Address,
        with_delegate_call: bool,
        access_level: u8,
    ) -> U256 {
        let mut word = U256::zero();
        word = ACTION_TARGET.set(word, address_to_word(target));
        word = ACTION_WITH_DELEGATE_CALL.set(word, u64::from(with_delegate_call).into());
        word = ACTION_ACCESS_LEVEL.set(word, access_level.into());
        word
    }
}

/// Storage layout of a governance-core deployment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GovernanceLayout {
    /// Base slot of the `id => proposal` mapping.
    pub proposals_mapping_slot: StorageSlot,
    /// Seconds a queued proposal waits before it may execute.
    pub cooldown_period: u64,
    /// Vote weight that guarantees the proposal counts as passed.
    pub minimum_passing_votes: U256,
}

impl GovernanceLayout {
    /// Word offsets within the proposal record.
    const CREATOR_OFFSET: u64 = 1;
    const VOTES_FOR_OFFSET: u64 = 2;
    const VOTES_AGAINST_OFFSET: u64 = 3;

    /// First (packed) slot of the proposal record for `id`.
    pub fn proposal_base_slot(&self, id: u64) -> StorageSlot {
        mapping_slot_uint(self.proposals_mapping_slot, U256::from(id))
    }

    /// Slot of the creator word.
    pub fn creator_slot(&self, id: u64) -> StorageSlot {
        self.proposal_base_slot(id) + U256::from(Self::CREATOR_OFFSET)
    }

    /// Slot of the for-votes word.
    pub fn votes_for_slot(&self, id: u64) -> StorageSlot {
        self.proposal_base_slot(id) + U256::from(Self::VOTES_FOR_OFFSET)
    }

    /// Slot of the against-votes word.
    pub fn votes_against_slot(&self, id: u64) -> StorageSlot {
        self.proposal_base_slot(id) + U256::from(Self::VOTES_AGAINST_OFFSET)
    }

    /// Packs the proposal's first storage word.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_proposal_word(
        &self,
        state: u8,
        access_level: u8,
        creation_time: u64,
        voting_duration: u32,
        voting_activation_time: u64,
        queuing_time: u64,
        cancel_timestamp: u64,
    ) -> U256 {
        let mut word = U256::zero();
        word = PROPOSAL_STATE.set(word, state.into());
        word = PROPOSAL_ACCESS_LEVEL.set(word, access_level.into());
        word = PROPOSAL_CREATION_TIME.set(word, creation_time.into());
        word = PROPOSAL_VOTING_DURATION.set(word, voting_duration.into());
        word = PROPOSAL_VOTING_ACTIVATION_TIME.set(word, voting_activation_time.into());
        word = PROPOSAL_QUEUING_TIME.set(word, queuing_time.into());
        word = PROPOSAL_CANCEL_TIMESTAMP.set(word, cancel_timestamp.into());
        word
    }

    /// Rewrites only the state and queuing-time fields of an existing
    /// packed proposal word.
    pub fn requeue_proposal_word(&self, word: U256, state: u8, queuing_time: u64) -> U256 {
        PROPOSAL_QUEUING_TIME.set(PROPOSAL_STATE.set(word, state.into()), queuing_time.into())
    }

    /// Reads the state byte out of a packed proposal word.
    pub fn proposal_state_field(&self, word: U256) -> U256 {
        PROPOSAL_STATE.get(word)
    }
}

/// Storage layout of a timelock executor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutorLayout {
    /// Base slot of the `actionHash => queued` mapping.
    pub queued_actions_mapping_slot: StorageSlot,
}

impl ExecutorLayout {
    /// Slot of the queued flag for one action hash.
    pub fn queued_action_slot(&self, action_hash: H256) -> StorageSlot {
        mapping_slot_b256(self.queued_actions_mapping_slot, action_hash)
    }
}

/// Per-contract layout knowledge, keyed by deployment address.
///
/// Constructed once at process start and passed by reference into whichever
/// builder needs it; contracts missing from the registry are refused, never
/// guessed at.
#[derive(Clone, Debug, Default)]
pub struct LayoutRegistry {
    governance: BTreeMap<Address, GovernanceLayout>,
    controllers: BTreeMap<Address, ControllerLayout>,
    executors: BTreeMap<Address, ExecutorLayout>,
}

impl LayoutRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The known mainnet deployment.
    pub fn mainnet() -> Self {
        let executor_lvl1 = Address::from(hex!("5300a1a15135ea4dc7ad5a167152c01efc9b192a"));
        let executor_lvl2 = Address::from(hex!("17dd33ed0e3dd2a80e37489b8a63063161be6957"));
        let governance = Address::from(hex!("9aee0b04504cef83a65ac3f0e838d0593bcb2bc7"));
        let controller = Address::from(hex!("dabad81af85554e9ae636395611c58f7ec1aaec5"));

        let mut registry = Self::new();
        registry.register_governance(
            governance,
            GovernanceLayout {
                proposals_mapping_slot: U256::from(7),
                cooldown_period: 0,
                minimum_passing_votes: U256::from(320_000u64) * U256::exp10(18),
            },
        );
        registry.register_controller(
            controller,
            ControllerLayout {
                payloads_mapping_slot: U256::from(3),
                payloads_count_slot: U256::from(2),
                action_word_size: 4,
                executors: BTreeMap::from([(1, executor_lvl1), (2, executor_lvl2)]),
            },
        );
        for executor in [executor_lvl1, executor_lvl2] {
            registry.register_executor(
                executor,
                ExecutorLayout {
                    queued_actions_mapping_slot: U256::from(3),
                },
            );
        }
        registry
    }

    /// Registers (or replaces) a governance layout.
    pub fn register_governance(&mut self, address: Address, layout: GovernanceLayout) {
        self.governance.insert(address, layout);
    }

    /// Registers (or replaces) a controller layout.
    pub fn register_controller(&mut self, address: Address, layout: ControllerLayout) {
        self.controllers.insert(address, layout);
    }

    /// Registers (or replaces) an executor layout.
    pub fn register_executor(&mut self, address: Address, layout: ExecutorLayout) {
        self.executors.insert(address, layout);
    }

    /// Layout of a governance core, if known.
    pub fn governance(&self, address: Address) -> Option<&GovernanceLayout> {
        self.governance.get(&address)
    }

    /// Layout of a payloads controller, if known.
    pub fn controller(&self, address: Address) -> Option<&ControllerLayout> {
        self.controllers.get(&address)
    }

    /// Layout of a timelock executor, if known.
    pub fn executor(&self, address: Address) -> Option<&ExecutorLayout> {
        self.executors.get(&address)
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn controller() -> ControllerLayout {
        ControllerLayout {
            payloads_mapping_slot: U256::from(3),
            payloads_count_slot: U256::from(2),
            action_word_size: 4,
            executors: BTreeMap::new(),
        }
    }

    #[test]
    fn payload_slots_match_reference_vectors() {
        let layout = controller();
        let base = U256::from_big_endian(&hex!(
            "f2c49132ed1cee2a7e75bde50d332a2f81f1d01e5456d8a19d1df09bd561dbd2"
        ));
        assert_eq!(layout.payload_base_slot(7), base);
        assert_eq!(layout.actions_length_slot(7), base + U256::from(2));
        let elements = U256::from_big_endian(&hex!(
            "18e1fb7db57b646ecac91714bee6ea15dd278fd681c1b36d73251f7a1c83f35a"
        ));
        assert_eq!(layout.action_word_slot(7, 0, 0), elements);
        assert_eq!(layout.action_word_slot(7, 1, 0), elements + U256::from(4));
        assert_eq!(layout.action_word_slot(7, 1, 3), elements + U256::from(7));
    }

    #[test]
    fn payload_word0_round_trips_through_reference_word() {
        let layout = controller();
        let fields = PayloadWord0 {
            creator: Address::from(hex!("5b38da6a701c568545dcfcb03fcb875f56beddc4")),
            maximum_access_level: 1,
            state: 2,
            created_at: 1_699_000_000,
            queued_at: 1_699_990_000,
        };
        let word = layout.encode_payload_word0(fields);
        assert_eq!(
            word,
            U256::from_big_endian(&hex!(
                "006553c9f0006544aec002015b38da6a701c568545dcfcb03fcb875f56beddc4"
            ))
        );
        assert_eq!(layout.decode_payload_word0(word), fields);
    }

    #[test]
    fn payload_timings_round_trip_through_reference_word() {
        let layout = controller();
        let timings = PayloadTimings {
            executed_at: 0,
            cancelled_at: 0,
            expiration_time: 1_702_000_000,
            delay: 86_400,
            grace_period: 604_800,
        };
        let word = layout.encode_payload_timings(timings);
        assert_eq!(
            word,
            U256::from_big_endian(&hex!(
                "000000000000000000093a800000015180006572758000000000000000000000"
            ))
        );
        assert_eq!(layout.decode_payload_timings(word), timings);
    }

    #[test]
    fn requeue_touches_only_state_and_queued_at() {
        let layout = controller();
        let original = layout.encode_payload_word0(PayloadWord0 {
            creator: Address::from_low_u64_be(0xbeef),
            maximum_access_level: 2,
            state: 1,
            created_at: 500,
            queued_at: 0,
        });
        let requeued = layout.requeue_payload_word0(original, 2, 400);
        let decoded = layout.decode_payload_word0(requeued);
        assert_eq!(decoded.state, 2);
        assert_eq!(decoded.queued_at, 400);
        assert_eq!(decoded.creator, Address::from_low_u64_be(0xbeef));
        assert_eq!(decoded.maximum_access_level, 2);
        assert_eq!(decoded.created_at, 500);
    }

    #[test]
    fn action_word_keeps_bool_and_level_in_their_own_bytes() {
        let layout = controller();
        let target = Address::from(hex!("300593b94e01dd563ed129e4a2a8992334ec85d4"));

        // A call-mode action must leave the delegatecall byte zero; the
        // access level lands one byte up, not straddling it.
        let word = layout.encode_action_word0(target, false, 1);
        let mut bytes = [0u8; 32];
        word.to_big_endian(&mut bytes);
        assert_eq!(bytes[11], 0, "withDelegateCall byte");
        assert_eq!(bytes[10], 1, "accessLevel byte");
        assert_eq!(Address::from_slice(&bytes[12..]), target);

        let word = layout.encode_action_word0(target, true, 2);
        word.to_big_endian(&mut bytes);
        assert_eq!(bytes[11], 1, "withDelegateCall byte");
        assert_eq!(bytes[10], 2, "accessLevel byte");
    }

    #[test]
    fn proposal_word_matches_reference_vector() {
        let layout = GovernanceLayout {
            proposals_mapping_slot: U256::from(7),
            cooldown_period: 0,
            minimum_passing_votes: U256::zero(),
        };
        let word = layout.encode_proposal_word(
            4,
            1,
            1_698_000_000,
            43_200,
            1_698_100_000,
            1_698_900_000,
            0,
        );
        assert_eq!(
            word,
            U256::from_big_endian(&hex!(
                "0000000000000000000000000065432820006536f32000a8c00065356c800104"
            ))
        );
        assert_eq!(
            layout.proposal_base_slot(42),
            U256::from_big_endian(&hex!(
                "c4250a0f26818bb2f4c50553605e6aa5374a022de55e294b0c5f6716bcaddbf8"
            ))
        );
    }
}
