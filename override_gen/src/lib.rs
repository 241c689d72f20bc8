//! Turns governance records into the synthetic state a bytecode simulator
//! needs to rehearse their execution ahead of time.
//!
//! On-chain, a proposal or payload only becomes executable after real-world
//! delays elapse: voting closes, a timelock cooldown passes. Reviewers
//! cannot wait for that. This crate reconstructs, off-chain, the exact
//! storage words the chain would hold once those delays had elapsed
//! (packed struct rewrites for queued entities, whole records synthesized
//! from scratch for freshly created ones) and hands them back as an
//! immutable [`OverrideBundle`] ready for submission to an external
//! execution simulator.
//!
//! Everything here is a pure function over caller-supplied records and
//! storage words. Reading the chain, talking to the simulator and caching
//! results belong to the caller; in particular the caller snapshots any
//! counters or packed words *before* calling in, which is what keeps
//! concurrent simulations against a moving chain head coherent.

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

mod action_hash;
mod builder;
mod bundle;
mod layout;
mod records;
mod states;

pub use action_hash::queued_action_hash;
pub use builder::{
    force_payload_execution, force_proposal_execution, ForceError, ForceResult,
    SimulationContext,
};
pub use bundle::{BlockOverride, OverrideBundle, StateOverride};
pub use layout::{
    ControllerLayout, ExecutorLayout, GovernanceLayout, LayoutRegistry, PayloadTimings,
    PayloadWord0,
};
pub use records::{Action, Payload, Proposal};
pub use states::{PayloadState, ProposalState};
