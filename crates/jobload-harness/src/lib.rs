//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Workload orchestration engine."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
//! Provisions a tenant fixture once, then drives concurrent actor populations against
//! the platform while counting every boundary call as a pass or a fail.

pub mod actors;
pub mod context;
pub mod error;
pub mod fixture;
pub mod outcome;
pub mod provisioner;
pub mod report;
pub mod run;
pub mod scheduler;
pub mod template;

pub use actors::{CatalogMutator, EventSender};
pub use context::HarnessContext;
pub use error::HarnessError;
pub use fixture::{FixtureSet, LoadedArtifact};
pub use outcome::{checks, CheckSummary, OutcomeRecorder};
pub use provisioner::{ensure_fixture, provisioning_plan, FixtureStatus};
pub use report::RunReport;
pub use run::{Harness, CATALOG_POPULATION, EVENTS_POPULATION};
pub use scheduler::{
    ActorSlot, Behavior, Population, PopulationShape, PopulationSummary, ScenarioScheduler,
};
pub use template::{CatalogIdentifiers, PackageTemplate};
