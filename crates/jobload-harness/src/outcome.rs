//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Per-label pass/fail bookkeeping for boundary call checks."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use indexmap::IndexMap;
use jobload_metrics::prometheus::{IntCounter, Registry};
use jobload_metrics::CheckMetrics;
use jobload_transport::{CallStatus, Expectation};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use crate::HarnessError;

/// Check labels used by the provisioner and the actor behaviours.
pub mod checks {
    pub const TENANT_LOOKUP: &str = "tenant lookup status is OK";
    pub const ADD_TENANT: &str = "add tenant status is OK";
    pub const ADD_PACKAGE: &str = "add package status is OK";
    pub const EVENT_ACCEPTED: &str = "event status is 200";
    pub const CATALOG_PACKAGE: &str = "catalog package status is OK";

    pub fn upload(artifact: &str) -> String {
        format!("upload {artifact} status is OK")
    }
}

#[derive(Clone)]
struct CheckCounters {
    pass: IntCounter,
    fail: IntCounter,
}

/// Aggregate counts for one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub label: String,
    pub passed: u64,
    pub failed: u64,
}

/// Compares call statuses against expectations and counts the result per label.
///
/// Counters are atomic and shared between every actor, so concurrent `record` calls
/// never lose updates. Labels keep the order in which they were first seen.
pub struct OutcomeRecorder {
    metrics: CheckMetrics,
    checks: RwLock<IndexMap<String, CheckCounters>>,
}

impl OutcomeRecorder {
    pub fn new(registry: &Registry) -> Result<Self, HarnessError> {
        let metrics =
            CheckMetrics::new(registry).map_err(|err| HarnessError::Metrics(format!("{err:#}")))?;
        Ok(Self {
            metrics,
            checks: RwLock::new(IndexMap::new()),
        })
    }

    /// Record one observation. Returns whether it passed; never fails.
    pub fn record(&self, label: &str, status: &CallStatus, expectation: Expectation) -> bool {
        let passed = expectation.matches(status);
        let counters = self.counters(label);
        if passed {
            counters.pass.inc();
        } else {
            counters.fail.inc();
            warn!(check = label, code = %status, expected = ?expectation, "check failed");
        }
        passed
    }

    fn counters(&self, label: &str) -> CheckCounters {
        if let Some(existing) = self.checks.read().get(label) {
            return existing.clone();
        }
        let mut checks = self.checks.write();
        checks
            .entry(label.to_owned())
            .or_insert_with(|| {
                let (pass, fail) = self.metrics.counters(label);
                CheckCounters { pass, fail }
            })
            .clone()
    }

    pub fn summary(&self) -> Vec<CheckSummary> {
        self.checks
            .read()
            .iter()
            .map(|(label, counters)| CheckSummary {
                label: label.clone(),
                passed: counters.pass.get(),
                failed: counters.fail.get(),
            })
            .collect()
    }

    pub fn get(&self, label: &str) -> Option<CheckSummary> {
        self.checks.read().get(label).map(|counters| CheckSummary {
            label: label.to_owned(),
            passed: counters.pass.get(),
            failed: counters.fail.get(),
        })
    }

    pub fn total_failed(&self) -> u64 {
        self.checks
            .read()
            .values()
            .map(|counters| counters.fail.get())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jobload_metrics::new_registry;
    use tonic::Code;

    use super::*;

    #[test]
    fn mismatches_count_as_failures_without_raising() {
        let recorder = OutcomeRecorder::new(&new_registry()).unwrap();
        assert!(recorder.record("lookup", &CallStatus::Rpc(Code::Ok), Expectation::RpcOk));
        assert!(!recorder.record(
            "lookup",
            &CallStatus::Unreachable("refused".into()),
            Expectation::RpcOk
        ));
        assert_eq!(
            recorder.get("lookup"),
            Some(CheckSummary {
                label: "lookup".into(),
                passed: 1,
                failed: 1
            })
        );
        assert_eq!(recorder.total_failed(), 1);
    }

    #[test]
    fn summary_preserves_first_seen_order() {
        let recorder = OutcomeRecorder::new(&new_registry()).unwrap();
        recorder.record("b", &CallStatus::Http(200), Expectation::HTTP_OK);
        recorder.record("a", &CallStatus::Http(500), Expectation::HTTP_OK);
        let labels: Vec<_> = recorder.summary().into_iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_exact() {
        let recorder = Arc::new(OutcomeRecorder::new(&new_registry()).unwrap());
        let mut tasks = Vec::new();
        for worker in 0..16u64 {
            let recorder = recorder.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..500u64 {
                    let status = if (worker + i) % 3 == 0 {
                        CallStatus::Http(503)
                    } else {
                        CallStatus::Http(200)
                    };
                    recorder.record("mixed", &status, Expectation::HTTP_OK);
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let expected_fail = (0..16u64)
            .flat_map(|w| (0..500u64).map(move |i| (w + i) % 3 == 0))
            .filter(|failed| *failed)
            .count() as u64;
        let summary = recorder.get("mixed").unwrap();
        assert_eq!(summary.failed, expected_fail);
        assert_eq!(summary.passed, 16 * 500 - expected_fail);
    }
}
