//! Application layer of the governance rehearsal tooling: chain access,
//! simulator client, snapshot validation and report rendering, wired
//! together by the `govsim` binary.
//!
//! The library crates underneath are pure; everything that talks to the
//! network or the filesystem lives here.

pub mod compat;
pub mod provider;
pub mod registry;
pub mod report;
pub mod simulator;
pub mod snapshot;
pub mod tracing;

/// Common information for the `--version` CLI flags.
pub fn version() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
