//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Run driver wiring provisioning, scheduling and reporting together."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobload_common::{HarnessConfig, ScenarioConfig};
use jobload_metrics::prometheus::Registry;
use jobload_transport::{Connector, Expectation, Reply, Tenant};
use tracing::info;
use uuid::Uuid;

use crate::actors::{CatalogMutator, EventSender};
use crate::context::HarnessContext;
use crate::fixture::FixtureSet;
use crate::outcome::checks;
use crate::provisioner::{ensure_fixture, provisioning_plan, FixtureStatus};
use crate::report::RunReport;
use crate::scheduler::{Population, PopulationShape, PopulationSummary, ScenarioScheduler};
use crate::HarnessError;

pub const EVENTS_POPULATION: &str = "events";
pub const CATALOG_POPULATION: &str = "catalog";

/// Owns the run context and drives the provisioning and load phases.
pub struct Harness {
    run_id: Uuid,
    context: Arc<HarnessContext>,
}

impl Harness {
    /// Load fixture inputs and build the context from configuration.
    ///
    /// The package template must belong to the configured tenant.
    pub fn from_config(
        config: &HarnessConfig,
        connector: Arc<dyn Connector>,
        registry: &Registry,
    ) -> Result<Self, HarnessError> {
        let tenant = Tenant::new(config.tenant.id.clone(), config.tenant.display_name())?;
        let fixture = FixtureSet::load(&config.fixture)?;
        fixture.template().ensure_tenant(tenant.id())?;
        let context = HarnessContext::new(
            tenant,
            config.tenant.event_type.clone(),
            fixture,
            connector,
            registry,
        )?;
        Ok(Self::new(context))
    }

    pub fn new(context: HarnessContext) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            context: Arc::new(context),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn context(&self) -> &HarnessContext {
        &self.context
    }

    /// Provisioning phase only.
    pub async fn setup(&self) -> Result<FixtureStatus, HarnessError> {
        let context = &self.context;
        ensure_fixture(
            context.connector(),
            context.recorder(),
            context.tenant(),
            context.fixture(),
        )
        .await
    }

    /// Look the tenant up without provisioning anything.
    pub async fn verify(&self) -> Result<Reply<Vec<Tenant>>, HarnessError> {
        let mut control = self.context.connector().control().await?;
        let reply = control.tenants(self.context.tenant().id()).await;
        control.close();
        self.context
            .recorder()
            .record(checks::TENANT_LOOKUP, &reply.status, Expectation::RpcOk);
        Ok(reply)
    }

    pub fn plan(&self) -> Result<serde_json::Value, HarnessError> {
        provisioning_plan(self.context.tenant(), self.context.fixture())
    }

    /// Populations declared by `scenario`, events first.
    pub fn scheduler(&self, scenario: &ScenarioConfig) -> ScenarioScheduler {
        let mut scheduler = ScenarioScheduler::new(self.context.clone());
        if let Some(events) = &scenario.events {
            scheduler = scheduler.with_population(
                Population::new(
                    EVENTS_POPULATION,
                    PopulationShape::ConstantDuration {
                        actors: events.actors,
                        duration: events.duration,
                    },
                    Arc::new(EventSender::new(events.pacing)),
                )
                .with_start_delay(events.start_delay),
            );
        }
        if let Some(catalog) = &scenario.catalog {
            scheduler = scheduler.with_population(
                Population::new(
                    CATALOG_POPULATION,
                    PopulationShape::FixedIterations {
                        actors: catalog.actors,
                        iterations: catalog.iterations,
                        max_duration: catalog.max_duration,
                    },
                    Arc::new(CatalogMutator::new(catalog.seed_bound, catalog.pacing)),
                )
                .with_start_delay(catalog.start_delay),
            );
        }
        scheduler
    }

    /// Provision the fixture, then run the scenario's populations.
    pub async fn run(&self, scenario: &ScenarioConfig) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();
        info!(run = %self.run_id, tenant = self.context.tenant().id(), "run starting");
        let fixture = self.setup().await?;
        let populations = self.scheduler(scenario).run().await?;
        Ok(self.report(started_at, Some(fixture), populations))
    }

    /// Provisioning phase wrapped in a report.
    pub async fn setup_report(&self) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();
        let fixture = self.setup().await?;
        Ok(self.report(started_at, Some(fixture), Vec::new()))
    }

    fn report(
        &self,
        started_at: DateTime<Utc>,
        fixture: Option<FixtureStatus>,
        populations: Vec<PopulationSummary>,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            tenant: self.context.tenant().id().to_owned(),
            started_at,
            finished_at: Utc::now(),
            fixture,
            populations,
            checks: self.context.recorder().summary(),
        }
    }
}
