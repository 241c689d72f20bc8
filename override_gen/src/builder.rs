use ethabi::{ParamType, Token};
use ethereum_types::{Address, U256};
use storage_layout::{packed_short_bytes, packed_short_string, UnsupportedLengthError};
use thiserror::Error;
use tracing::debug;

use crate::action_hash::queued_action_hash;
use crate::bundle::{BlockOverride, OverrideAccumulator, OverrideBundle};
use crate::layout::{LayoutRegistry, PayloadTimings, PayloadWord0};
use crate::records::{Payload, Proposal};
use crate::states::{PayloadState, ProposalState};

/// Stores the result of override construction. Returns a [`ForceError`]
/// upon failure.
pub type ForceResult<T> = Result<T, ForceError>;

/// An error type for override construction.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ForceError {
    /// No storage layout is registered for the contract, so its slots
    /// cannot be derived. Guessing a layout would produce plausible but
    /// wrong slots, which is worse than refusing.
    #[error("no storage layout registered for contract {0:?}")]
    UnknownExecutor(Address),

    /// The entity settled in a negative final state; forcing it back to
    /// life would simulate a history the chain has already rejected.
    #[error("cannot force execution of {entity} {id}: state {state} is terminal")]
    TerminalState {
        /// `"proposal"` or `"payload"`.
        entity: &'static str,
        /// Entity id.
        id: u64,
        /// The terminal state encountered.
        state: String,
    },

    /// The entity does not exist under this id.
    #[error("{entity} {id} does not exist on-chain")]
    NotFound {
        /// `"proposal"` or `"payload"`.
        entity: &'static str,
        /// Entity id.
        id: u64,
    },

    /// A required input is absent from the record or the call.
    #[error("{entity} {id} is missing required input `{field}`")]
    MissingField {
        /// `"proposal"` or `"payload"`.
        entity: &'static str,
        /// Entity id.
        id: u64,
        /// Name of the missing input.
        field: &'static str,
    },

    /// An action's signature or call data does not fit the short in-place
    /// storage form this builder writes.
    #[error(transparent)]
    UnsupportedLength(#[from] UnsupportedLengthError),
}

/// The caller's snapshot of the world to simulate under.
///
/// Words and counters read from the chain are passed in here rather than
/// fetched by the builder, which keeps construction pure and makes each
/// concurrent simulation consistent with the chain head it snapshotted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimulationContext {
    /// Block number to simulate at.
    pub block_number: u64,
    /// Timestamp of the simulated block; forced delays are computed
    /// relative to this.
    pub timestamp: u64,
    /// Sender of the simulated call.
    pub sender: Address,
}

/// Builds the override bundle that lets a simulator execute `payload` now.
///
/// `current_word0` is the payload's first packed storage word as the
/// caller read it (required to requeue a `Queued` payload without
/// touching its other fields). `current_payload_count` is the controller's
/// payload counter at the same read.
pub fn force_payload_execution(
    payload: &Payload,
    controller: Address,
    registry: &LayoutRegistry,
    ctx: &SimulationContext,
    current_word0: Option<U256>,
    current_payload_count: u64,
) -> ForceResult<OverrideBundle> {
    let layout = registry
        .controller(controller)
        .ok_or(ForceError::UnknownExecutor(controller))?;

    match payload.state {
        PayloadState::None => Err(ForceError::NotFound {
            entity: "payload",
            id: payload.id,
        }),
        PayloadState::Executed => {
            let transaction_hash =
                payload
                    .transaction_hash
                    .ok_or(ForceError::MissingField {
                        entity: "payload",
                        id: payload.id,
                        field: "transactionHash",
                    })?;
            Ok(OverrideBundle::replay_of(
                controller,
                ctx.sender,
                transaction_hash,
            ))
        }
        PayloadState::Cancelled | PayloadState::Expired => Err(ForceError::TerminalState {
            entity: "payload",
            id: payload.id,
            state: payload.state.to_string(),
        }),
        PayloadState::Queued => {
            let word0 = current_word0.ok_or(ForceError::MissingField {
                entity: "payload",
                id: payload.id,
                field: "current packed word",
            })?;
            // Push the queueing timestamp far enough back that the
            // timelock delay has elapsed at the simulated timestamp.
            let queued_at = ctx.timestamp.saturating_sub(payload.delay + 1);
            let mut overrides = OverrideAccumulator::new();
            overrides.set_word(
                controller,
                layout.payload_base_slot(payload.id),
                layout.requeue_payload_word0(word0, PayloadState::Queued as u8, queued_at),
            );
            debug!(id = payload.id, queued_at, "requeued payload in place");
            Ok(execute_payload_bundle(payload.id, controller, ctx, overrides))
        }
        PayloadState::Created => {
            let bundle =
                synthesize_queued_payload(payload, controller, registry, ctx, current_payload_count)?;
            Ok(bundle)
        }
    }
}

/// Forges the complete queued record of a payload that was created but
/// never queued: both packed words, the actions array and the executor's
/// queued-action flags.
fn synthesize_queued_payload(
    payload: &Payload,
    controller: Address,
    registry: &LayoutRegistry,
    ctx: &SimulationContext,
    current_payload_count: u64,
) -> ForceResult<OverrideBundle> {
    let layout = registry
        .controller(controller)
        .ok_or(ForceError::UnknownExecutor(controller))?;
    if payload.actions.is_empty() {
        return Err(ForceError::MissingField {
            entity: "payload",
            id: payload.id,
            field: "actions",
        });
    }
    let executor = *layout
        .executors
        .get(&payload.maximum_access_level)
        .ok_or(ForceError::MissingField {
            entity: "payload",
            id: payload.id,
            field: "executor for access level",
        })?;
    let executor_layout = registry
        .executor(executor)
        .ok_or(ForceError::UnknownExecutor(executor))?;

    let queued_at = ctx.timestamp.saturating_sub(payload.delay + 1);
    // The timestamp the executor believes the actions became executable;
    // it also feeds every queued-action hash, so it must be the exact
    // value the contract would have computed when queueing.
    let execution_time = queued_at + payload.delay;

    let mut overrides = OverrideAccumulator::new();
    let base = layout.payload_base_slot(payload.id);
    overrides.set_word(
        controller,
        base,
        layout.encode_payload_word0(PayloadWord0 {
            creator: payload.creator,
            maximum_access_level: payload.maximum_access_level,
            state: PayloadState::Queued as u8,
            created_at: if payload.created_at == 0 {
                queued_at
            } else {
                payload.created_at
            },
            queued_at,
        }),
    );
    overrides.set_word(
        controller,
        base + U256::from(1),
        layout.encode_payload_timings(PayloadTimings {
            executed_at: 0,
            cancelled_at: 0,
            expiration_time: if payload.expiration_time == 0 {
                ctx.timestamp + payload.grace_period
            } else {
                payload.expiration_time
            },
            delay: payload.delay,
            grace_period: payload.grace_period,
        }),
    );
    overrides.set_word(
        controller,
        layout.actions_length_slot(payload.id),
        U256::from(payload.actions.len()),
    );

    for (index, action) in payload.actions.iter().enumerate() {
        let index = index as u64;
        overrides.set_word(
            controller,
            layout.action_word_slot(payload.id, index, 0),
            layout.encode_action_word0(
                action.target,
                action.with_delegate_call,
                action.access_level,
            ),
        );
        overrides.set_word(
            controller,
            layout.action_word_slot(payload.id, index, 1),
            action.value,
        );
        overrides.set_word(
            controller,
            layout.action_word_slot(payload.id, index, 2),
            packed_short_string(&action.signature)?,
        );
        overrides.set_word(
            controller,
            layout.action_word_slot(payload.id, index, 3),
            packed_short_bytes(&action.call_data)?,
        );

        let action_hash = queued_action_hash(
            action.target,
            action.value,
            &action.signature,
            &action.call_data,
            execution_time,
            action.with_delegate_call,
        );
        overrides.set_word(
            executor,
            executor_layout.queued_action_slot(action_hash),
            U256::one(),
        );
    }

    // The record must sit below the counter or the controller treats the
    // id as unregistered. The caller snapshotted the counter together
    // with everything else it read.
    overrides.set_word(
        controller,
        layout.payloads_count_slot,
        U256::from(current_payload_count.max(payload.id + 1)),
    );

    debug!(
        id = payload.id,
        actions = payload.actions.len(),
        %executor,
        "synthesized queued payload record"
    );
    Ok(execute_payload_bundle(payload.id, controller, ctx, overrides))
}

fn execute_payload_bundle(
    id: u64,
    controller: Address,
    ctx: &SimulationContext,
    overrides: OverrideAccumulator,
) -> OverrideBundle {
    let mut call_data =
        ethabi::short_signature("executePayload", &[ParamType::Uint(40)]).to_vec();
    call_data.extend(ethabi::encode(&[Token::Uint(id.into())]));
    OverrideBundle {
        target: controller,
        from: ctx.sender,
        call_data,
        block: Some(BlockOverride {
            number: ctx.block_number,
            timestamp: ctx.timestamp,
        }),
        state: overrides.freeze(),
        replay: None,
    }
}

/// Builds the override bundle that lets a simulator execute `proposal`
/// now.
///
/// `current_word` is the proposal's packed storage word as the caller
/// read it, required for the in-place `Queued` rewrite.
pub fn force_proposal_execution(
    proposal: &Proposal,
    governance: Address,
    registry: &LayoutRegistry,
    ctx: &SimulationContext,
    current_word: Option<U256>,
) -> ForceResult<OverrideBundle> {
    let layout = registry
        .governance(governance)
        .ok_or(ForceError::UnknownExecutor(governance))?;

    match proposal.state {
        ProposalState::Null => Err(ForceError::NotFound {
            entity: "proposal",
            id: proposal.id,
        }),
        ProposalState::Executed => {
            let transaction_hash =
                proposal
                    .transaction_hash
                    .ok_or(ForceError::MissingField {
                        entity: "proposal",
                        id: proposal.id,
                        field: "transactionHash",
                    })?;
            Ok(OverrideBundle::replay_of(
                governance,
                ctx.sender,
                transaction_hash,
            ))
        }
        ProposalState::Failed | ProposalState::Cancelled | ProposalState::Expired => {
            Err(ForceError::TerminalState {
                entity: "proposal",
                id: proposal.id,
                state: proposal.state.to_string(),
            })
        }
        ProposalState::Queued => {
            let word = current_word.ok_or(ForceError::MissingField {
                entity: "proposal",
                id: proposal.id,
                field: "current packed word",
            })?;
            let queuing_time = ctx.timestamp.saturating_sub(layout.cooldown_period + 1);
            let mut overrides = OverrideAccumulator::new();
            overrides.set_word(
                governance,
                layout.proposal_base_slot(proposal.id),
                layout.requeue_proposal_word(word, ProposalState::Queued as u8, queuing_time),
            );
            debug!(id = proposal.id, queuing_time, "requeued proposal in place");
            Ok(execute_proposal_bundle(proposal.id, governance, ctx, overrides))
        }
        ProposalState::Created | ProposalState::Active => {
            let queuing_time = ctx.timestamp.saturating_sub(layout.cooldown_period + 1);
            let voting_activation_time = if proposal.voting_activation_time == 0 {
                queuing_time.saturating_sub(u64::from(proposal.voting_duration))
            } else {
                proposal.voting_activation_time
            };
            let creation_time = if proposal.creation_time == 0 {
                voting_activation_time
            } else {
                proposal.creation_time
            };

            let mut overrides = OverrideAccumulator::new();
            overrides.set_word(
                governance,
                layout.proposal_base_slot(proposal.id),
                layout.encode_proposal_word(
                    ProposalState::Queued as u8,
                    proposal.access_level,
                    creation_time,
                    proposal.voting_duration,
                    voting_activation_time,
                    queuing_time,
                    0,
                ),
            );
            overrides.set_word(
                governance,
                layout.creator_slot(proposal.id),
                U256::from_big_endian(proposal.creator.as_bytes()),
            );
            // The vote tally must clear the bar and beat the against side,
            // whatever the record currently holds.
            let votes_for = proposal
                .votes_for
                .max(layout.minimum_passing_votes)
                .max(proposal.votes_against + U256::one());
            overrides.set_word(governance, layout.votes_for_slot(proposal.id), votes_for);
            overrides.set_word(
                governance,
                layout.votes_against_slot(proposal.id),
                proposal.votes_against,
            );
            debug!(id = proposal.id, %votes_for, "synthesized queued proposal record");
            Ok(execute_proposal_bundle(proposal.id, governance, ctx, overrides))
        }
    }
}

fn execute_proposal_bundle(
    id: u64,
    governance: Address,
    ctx: &SimulationContext,
    overrides: OverrideAccumulator,
) -> OverrideBundle {
    let mut call_data = ethabi::short_signature("execute", &[ParamType::Uint(256)]).to_vec();
    call_data.extend(ethabi::encode(&[Token::Uint(id.into())]));
    OverrideBundle {
        target: governance,
        from: ctx.sender,
        call_data,
        block: Some(BlockOverride {
            number: ctx.block_number,
            timestamp: ctx.timestamp,
        }),
        state: overrides.freeze(),
        replay: None,
    }
}
