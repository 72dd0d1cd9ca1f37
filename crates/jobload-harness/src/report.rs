//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "End-of-run report: fixture status, population summaries and check counts."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::outcome::CheckSummary;
use crate::provisioner::FixtureStatus;
use crate::scheduler::PopulationSummary;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub tenant: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fixture: Option<FixtureStatus>,
    pub populations: Vec<PopulationSummary>,
    pub checks: Vec<CheckSummary>,
}

impl RunReport {
    pub fn passed(&self) -> u64 {
        self.checks.iter().map(|check| check.passed).sum()
    }

    pub fn failed(&self) -> u64 {
        self.checks.iter().map(|check| check.failed).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
            || self
                .fixture
                .as_ref()
                .map_or(false, |status| !status.is_complete())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let elapsed = self.finished_at - self.started_at;
        let _ = writeln!(out, "run {} (tenant {})", self.run_id, self.tenant);
        let _ = writeln!(
            out,
            "  started {}  finished {}  ({} ms)",
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339(),
            elapsed.num_milliseconds()
        );
        if let Some(fixture) = &self.fixture {
            let _ = writeln!(out, "  fixture: {fixture}");
        }
        if !self.populations.is_empty() {
            let _ = writeln!(out, "populations:");
            for population in &self.populations {
                let _ = writeln!(
                    out,
                    "  {:<12} {:<17} actors={} iterations={} completed={} terminated={} elapsed={}ms",
                    population.name,
                    population.shape,
                    population.actors,
                    population.iterations,
                    population.completed_actors,
                    population.terminated_actors,
                    population.elapsed_ms
                );
            }
        }
        let _ = writeln!(out, "checks:");
        for check in &self.checks {
            let mark = if check.failed == 0 { "✓" } else { "✗" };
            let _ = writeln!(
                out,
                "  {mark} {:<36} pass={} fail={}",
                check.label, check.passed, check.failed
            );
        }
        let _ = writeln!(out, "total: pass={} fail={}", self.passed(), self.failed());
        out
    }
}
