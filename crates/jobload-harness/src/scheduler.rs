//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Population scheduling: constant-duration and fixed-iteration actor groups."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobload_metrics::prometheus::{IntCounter, IntGauge};
use jobload_transport::ControlPlane;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::context::HarnessContext;
use crate::HarnessError;

/// One repeatable unit of work.
#[async_trait]
pub trait Behavior: Send + Sync + 'static {
    /// Delay the scheduler inserts after every invocation.
    fn pacing(&self) -> Duration {
        Duration::ZERO
    }

    /// Perform one invocation. Only fatal conditions are returned as errors.
    async fn perform(&self, slot: &mut ActorSlot, context: &HarnessContext)
        -> Result<(), HarnessError>;
}

/// Per-actor state: the actor index and a lazily opened control-plane client.
pub struct ActorSlot {
    actor: usize,
    control: Option<Box<dyn ControlPlane>>,
}

impl ActorSlot {
    pub fn new(actor: usize) -> Self {
        Self {
            actor,
            control: None,
        }
    }

    pub fn actor(&self) -> usize {
        self.actor
    }

    /// Control-plane client owned by this actor, connected on first use.
    pub async fn control(
        &mut self,
        context: &HarnessContext,
    ) -> Result<&dyn ControlPlane, HarnessError> {
        let client = match self.control.take() {
            Some(client) => client,
            None => {
                let client = context.connector().control().await?;
                debug!(actor = self.actor, "actor control channel opened");
                client
            }
        };
        Ok(&**self.control.insert(client))
    }

    pub fn has_connection(&self) -> bool {
        self.control.is_some()
    }

    pub fn release(&mut self) {
        if let Some(mut client) = self.control.take() {
            client.close();
        }
    }
}

impl Drop for ActorSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// How long a population's actors keep invoking their behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationShape {
    /// Every actor repeats until `duration` has elapsed.
    ConstantDuration { actors: usize, duration: Duration },
    /// Every actor performs exactly `iterations` invocations; anything still running at
    /// `max_duration` is terminated.
    FixedIterations {
        actors: usize,
        iterations: u64,
        max_duration: Duration,
    },
}

impl PopulationShape {
    pub fn actors(&self) -> usize {
        match self {
            PopulationShape::ConstantDuration { actors, .. }
            | PopulationShape::FixedIterations { actors, .. } => *actors,
        }
    }

    fn budget(&self) -> Duration {
        match self {
            PopulationShape::ConstantDuration { duration, .. } => *duration,
            PopulationShape::FixedIterations { max_duration, .. } => *max_duration,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PopulationShape::ConstantDuration { .. } => "constant-duration",
            PopulationShape::FixedIterations { .. } => "fixed-iterations",
        }
    }
}

pub struct Population {
    name: String,
    shape: PopulationShape,
    start_delay: Duration,
    behavior: Arc<dyn Behavior>,
}

impl Population {
    pub fn new(
        name: impl Into<String>,
        shape: PopulationShape,
        behavior: Arc<dyn Behavior>,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            start_delay: Duration::ZERO,
            behavior,
        }
    }

    /// Offset from scenario start before any actor of this population begins.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationSummary {
    pub name: String,
    pub shape: &'static str,
    pub actors: usize,
    pub iterations: u64,
    /// Actors that finished their work. For a constant-duration population this includes
    /// actors cut off at the end of the duration, which is how that shape ends.
    pub completed_actors: usize,
    /// Fixed-iteration actors still short of their iterations at `max_duration`, abandoned
    /// mid-flight. Always zero for a constant-duration population.
    pub terminated_actors: usize,
    pub elapsed_ms: u64,
}

/// Runs a set of populations side by side against one shared context.
pub struct ScenarioScheduler {
    context: Arc<HarnessContext>,
    populations: Vec<Population>,
}

impl ScenarioScheduler {
    pub fn new(context: Arc<HarnessContext>) -> Self {
        Self {
            context,
            populations: Vec::new(),
        }
    }

    pub fn with_population(mut self, population: Population) -> Self {
        self.populations.push(population);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    /// Run every population to its own budget. Populations never wait on each other; a
    /// fatal error in any of them aborts the whole scenario.
    pub async fn run(self) -> Result<Vec<PopulationSummary>, HarnessError> {
        let scenario_start = Instant::now();
        let names: Vec<String> = self.populations.iter().map(|p| p.name.clone()).collect();
        let mut set = JoinSet::new();
        for (index, population) in self.populations.into_iter().enumerate() {
            let context = self.context.clone();
            set.spawn(async move {
                (
                    index,
                    run_population(population, context, scenario_start).await,
                )
            });
        }

        let mut summaries: Vec<Option<PopulationSummary>> = vec![None; names.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(summary))) => summaries[index] = Some(summary),
                Ok((index, Err(err))) => {
                    warn!(population = %names[index], error = %err, "population aborted; stopping scenario");
                    set.shutdown().await;
                    return Err(err);
                }
                Err(source) => {
                    set.shutdown().await;
                    return Err(HarnessError::Join {
                        population: "scenario".into(),
                        source,
                    });
                }
            }
        }
        Ok(summaries.into_iter().flatten().collect())
    }
}

struct ActiveGuard(IntGauge);

impl ActiveGuard {
    fn enter(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

async fn run_population(
    population: Population,
    context: Arc<HarnessContext>,
    scenario_start: Instant,
) -> Result<PopulationSummary, HarnessError> {
    let Population {
        name,
        shape,
        start_delay,
        behavior,
    } = population;
    sleep_until(scenario_start + start_delay).await;

    let started = Instant::now();
    let deadline = started + shape.budget();
    let iterations = Arc::new(AtomicU64::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let metrics = context.actor_metrics();
    info!(population = %name, shape = shape.label(), actors = shape.actors(), budget_ms = shape.budget().as_millis() as u64, "population starting");

    let mut actors = JoinSet::new();
    for actor in 0..shape.actors() {
        let behavior = behavior.clone();
        let context = context.clone();
        let iterations = iterations.clone();
        let counter = metrics.iteration_counter(&name);
        let gauge = metrics.active_gauge(&name);
        actors.spawn(async move {
            let _active = ActiveGuard::enter(gauge);
            run_actor(actor, shape, deadline, behavior, &context, &iterations, &counter).await
        });
    }

    let drained = timeout_at(deadline, async {
        while let Some(joined) = actors.join_next().await {
            match joined {
                Ok(Ok(())) => {
                    completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => return Err(err),
                Err(source) => {
                    return Err(HarnessError::Join {
                        population: name.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    })
    .await;

    let terminated = match drained {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            actors.shutdown().await;
            return Err(err);
        }
        Err(_elapsed) => {
            let remaining = actors.len();
            actors.shutdown().await;
            match shape {
                PopulationShape::ConstantDuration { .. } => {
                    completed.fetch_add(remaining, Ordering::Relaxed);
                    0
                }
                PopulationShape::FixedIterations { .. } => remaining,
            }
        }
    };

    let summary = PopulationSummary {
        name,
        shape: shape.label(),
        actors: shape.actors(),
        iterations: iterations.load(Ordering::Relaxed),
        completed_actors: completed.load(Ordering::Relaxed),
        terminated_actors: terminated,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        population = %summary.name,
        iterations = summary.iterations,
        completed = summary.completed_actors,
        terminated = summary.terminated_actors,
        "population finished"
    );
    Ok(summary)
}

async fn run_actor(
    actor: usize,
    shape: PopulationShape,
    deadline: Instant,
    behavior: Arc<dyn Behavior>,
    context: &HarnessContext,
    iterations: &AtomicU64,
    counter: &IntCounter,
) -> Result<(), HarnessError> {
    let mut slot = ActorSlot::new(actor);
    let pacing = behavior.pacing();
    let mut performed = 0u64;
    loop {
        let more = match shape {
            PopulationShape::ConstantDuration { .. } => Instant::now() < deadline,
            PopulationShape::FixedIterations {
                iterations: budget, ..
            } => performed < budget,
        };
        if !more {
            break;
        }
        behavior.perform(&mut slot, context).await?;
        performed += 1;
        iterations.fetch_add(1, Ordering::Relaxed);
        counter.inc();
        if !pacing.is_zero() {
            sleep(pacing).await;
        }
    }
    slot.release();
    debug!(actor, performed, "actor finished");
    Ok(())
}
