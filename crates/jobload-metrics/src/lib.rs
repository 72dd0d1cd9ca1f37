//! ---
//! jl_section: "03-observability"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Metrics collection and export utilities."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
    TEXT_FORMAT,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Label value recorded for checks that matched their expectation.
pub const OUTCOME_PASS: &str = "pass";
/// Label value recorded for checks that did not match their expectation.
pub const OUTCOME_FAIL: &str = "fail";

const OUTCOME_LABEL: &str = "outcome";

/// Shared registry type used across the harness.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let local_addr = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %local_addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    match TextEncoder::new().encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT))],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain"),
                )],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Return the bound address for convenience.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Pass/fail counters keyed by check label.
#[derive(Clone, Debug)]
pub struct CheckMetrics {
    checks: IntCounterVec,
}

impl CheckMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let checks = IntCounterVec::new(
            Opts::new(
                "jobload_checks_total",
                "Boundary call checks by label and outcome",
            ),
            &["check", OUTCOME_LABEL],
        )?;
        registry.register(Box::new(checks.clone()))?;
        Ok(Self { checks })
    }

    /// Counter pair for a check label, as `(pass, fail)`.
    pub fn counters(&self, check: &str) -> (IntCounter, IntCounter) {
        (
            self.checks.with_label_values(&[check, OUTCOME_PASS]),
            self.checks.with_label_values(&[check, OUTCOME_FAIL]),
        )
    }
}

/// Scheduler-level counters describing actor activity per population.
#[derive(Clone, Debug)]
pub struct ActorMetrics {
    iterations: IntCounterVec,
    active: IntGaugeVec,
}

impl ActorMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let iterations = IntCounterVec::new(
            Opts::new(
                "jobload_actor_iterations_total",
                "Completed behaviour invocations by population",
            ),
            &["population"],
        )?;
        registry.register(Box::new(iterations.clone()))?;

        let active = IntGaugeVec::new(
            Opts::new(
                "jobload_actors_active",
                "Actors currently running by population",
            ),
            &["population"],
        )?;
        registry.register(Box::new(active.clone()))?;

        Ok(Self { iterations, active })
    }

    pub fn iteration_counter(&self, population: &str) -> IntCounter {
        self.iterations.with_label_values(&[population])
    }

    pub fn active_gauge(&self, population: &str) -> IntGauge {
        self.active.with_label_values(&[population])
    }
}

pub use prometheus;
