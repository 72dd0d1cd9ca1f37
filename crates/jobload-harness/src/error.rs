//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Hard-stop errors raised by the orchestration engine."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::path::PathBuf;

use jobload_transport::TransportError;
use thiserror::Error;

/// Conditions that stop a run. Per-call failures are never represented here; they are
/// counted by the outcome recorder instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to read fixture file {path}: {source}")]
    FixtureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("package template {origin} is unusable: {reason}")]
    Template { origin: String, reason: String },
    #[error("fatal transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("actor task in population '{population}' failed: {source}")]
    Join {
        population: String,
        #[source]
        source: tokio::task::JoinError,
    },
    #[error("metrics registration failed: {0}")]
    Metrics(String),
}
