//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Explicit run context handed to every actor invocation."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jobload_metrics::prometheus::Registry;
use jobload_metrics::ActorMetrics;
use jobload_transport::{Connector, EventSink, Tenant};

use crate::fixture::FixtureSet;
use crate::outcome::OutcomeRecorder;
use crate::HarnessError;

/// Everything an actor may touch during a run.
///
/// The fixture and tenant are read-only once constructed. The recorder and the catalog
/// sequence are the only shared mutable state and both are atomic.
pub struct HarnessContext {
    tenant: Tenant,
    event_type: String,
    fixture: Arc<FixtureSet>,
    connector: Arc<dyn Connector>,
    events: Arc<dyn EventSink>,
    recorder: Arc<OutcomeRecorder>,
    actor_metrics: ActorMetrics,
    catalog_sequence: AtomicU64,
}

impl HarnessContext {
    /// Builds the context and opens the shared event sink.
    pub fn new(
        tenant: Tenant,
        event_type: impl Into<String>,
        fixture: FixtureSet,
        connector: Arc<dyn Connector>,
        registry: &Registry,
    ) -> Result<Self, HarnessError> {
        let events = connector.events()?;
        let recorder = Arc::new(OutcomeRecorder::new(registry)?);
        let actor_metrics = ActorMetrics::new(registry)
            .map_err(|err| HarnessError::Metrics(format!("{err:#}")))?;
        Ok(Self {
            tenant,
            event_type: event_type.into(),
            fixture: Arc::new(fixture),
            connector,
            events,
            recorder,
            actor_metrics,
            catalog_sequence: AtomicU64::new(0),
        })
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn fixture(&self) -> &FixtureSet {
        &self.fixture
    }

    pub fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    pub fn recorder(&self) -> &OutcomeRecorder {
        &self.recorder
    }

    pub fn recorder_handle(&self) -> Arc<OutcomeRecorder> {
        self.recorder.clone()
    }

    pub fn actor_metrics(&self) -> &ActorMetrics {
        &self.actor_metrics
    }

    /// Next catalog submission number for this run.
    pub fn next_catalog_sequence(&self) -> u64 {
        self.catalog_sequence.fetch_add(1, Ordering::Relaxed)
    }
}
