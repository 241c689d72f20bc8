//! Structural diffing of point-in-time configuration snapshots.
//!
//! A snapshot is an arbitrarily deep, keyed tree of primitives (reserve
//! parameters, rate-strategy parameters, risk categories) read from JSON.
//! [`diff`] walks two such trees key by key and produces a [`DiffNode`]
//! tree holding only what changed (plus, optionally, unchanged context).
//!
//! The engine knows nothing about chains or protocols: it is equally used
//! to compare two deployment snapshots for release review and to shape the
//! state diff an execution simulator returns.

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

pub mod apply;
mod diff;

pub use diff::{diff, DiffError, DiffNode, DiffResult, MAX_DEPTH};
