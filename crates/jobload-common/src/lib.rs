//! ---
//! jl_section: "01-core-functionality"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Shared primitives for the jobload workspace."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
//! Shared primitives for the jobload workspace: configuration loading and tracing
//! initialisation consumed by the harness crates and the operator CLI.

pub mod config;
pub mod logging;

pub use config::{
    ArtifactConfig, ArtifactKind, CatalogPopulationConfig, EventPopulationConfig,
    FixtureConfig, HarnessConfig, LoadedHarnessConfig, LoggingConfig, MetricsConfig,
    ScenarioConfig, SecurityMode, TargetConfig, TenantConfig,
};
pub use logging::{init_tracing, LogFormat};
