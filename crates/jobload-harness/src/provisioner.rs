//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Idempotent tenant fixture provisioning."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::fmt;

use jobload_transport::{
    ArtifactUpload, Connector, ControlPlane, Expectation, Repository, Tenant,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::fixture::FixtureSet;
use crate::outcome::{checks, OutcomeRecorder};
use crate::HarnessError;

/// Result of [`ensure_fixture`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FixtureStatus {
    /// The tenant existed; nothing was submitted.
    AlreadyPresent,
    /// Tenant, artifacts and package were all accepted.
    Provisioned,
    /// Provisioning ran but some steps were rejected. Nothing is rolled back, and the
    /// tenant will satisfy the existence check on the next run.
    Partial { failed_steps: Vec<String> },
    /// The existence check itself failed, so provisioning was skipped.
    Unverified { reason: String },
}

impl FixtureStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FixtureStatus::AlreadyPresent | FixtureStatus::Provisioned)
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::AlreadyPresent => f.write_str("already present"),
            FixtureStatus::Provisioned => f.write_str("provisioned"),
            FixtureStatus::Partial { failed_steps } => {
                write!(f, "partial (failed: {})", failed_steps.join(", "))
            }
            FixtureStatus::Unverified { reason } => write!(f, "unverified ({reason})"),
        }
    }
}

/// Control and repository clients held for the provisioning phase only.
/// Dropping the session releases both channels on every exit path.
struct ProvisionSession {
    control: Box<dyn ControlPlane>,
    repository: Box<dyn Repository>,
}

impl ProvisionSession {
    async fn open(connector: &dyn Connector) -> Result<Self, HarnessError> {
        let control = connector.control().await?;
        let repository = connector.repository().await?;
        Ok(Self {
            control,
            repository,
        })
    }
}

impl Drop for ProvisionSession {
    fn drop(&mut self) {
        self.repository.close();
        self.control.close();
    }
}

/// Make sure `tenant` and its fixture exist, submitting them only when the tenant is absent.
///
/// Steps run strictly in order: tenant, then each artifact as declared, then the package.
/// A rejected step is recorded and the remaining steps still run.
pub async fn ensure_fixture(
    connector: &dyn Connector,
    recorder: &OutcomeRecorder,
    tenant: &Tenant,
    fixture: &FixtureSet,
) -> Result<FixtureStatus, HarnessError> {
    let session = ProvisionSession::open(connector).await?;

    let lookup = session.control.tenants(tenant.id()).await;
    if !recorder.record(checks::TENANT_LOOKUP, &lookup.status, Expectation::RpcOk) {
        let status = FixtureStatus::Unverified {
            reason: lookup.status.to_string(),
        };
        warn!(tenant = tenant.id(), %status, "tenant existence check failed; skipping provisioning");
        return Ok(status);
    }
    let known = lookup.body.map(|tenants| tenants.len()).unwrap_or_default();
    if known > 0 {
        info!(tenant = tenant.id(), "tenant already present; fixture assumed valid");
        return Ok(FixtureStatus::AlreadyPresent);
    }

    let mut failed_steps = Vec::new();

    let added = session.control.add_tenant(tenant).await;
    if !recorder.record(checks::ADD_TENANT, &added.status, Expectation::RpcOk) {
        failed_steps.push("add tenant".to_owned());
    }

    for artifact in fixture.artifacts() {
        let upload = ArtifactUpload::new(
            tenant.id(),
            artifact.name.clone(),
            artifact.kind,
            artifact.content.clone(),
        )?;
        let reply = session.repository.add_file(&upload).await;
        if !recorder.record(&checks::upload(&artifact.name), &reply.status, Expectation::RpcOk) {
            failed_steps.push(format!("upload {}", artifact.name));
        }
    }

    let submitted = session
        .control
        .add_package(fixture.template().document())
        .await;
    if !recorder.record(checks::ADD_PACKAGE, &submitted.status, Expectation::RpcOk) {
        failed_steps.push("add package".to_owned());
    }
    drop(session);

    let status = if failed_steps.is_empty() {
        FixtureStatus::Provisioned
    } else {
        FixtureStatus::Partial { failed_steps }
    };
    info!(tenant = tenant.id(), %status, "fixture provisioning finished");
    Ok(status)
}

/// The provisioning requests in the platform's JSON mapping, in submission order.
pub fn provisioning_plan(tenant: &Tenant, fixture: &FixtureSet) -> Result<Value, HarnessError> {
    let mut steps = vec![
        json!({ "method": "/Control/Tenants", "request": { "ID": tenant.id() } }),
        json!({ "method": "/Control/AddTenant", "request": { "tenant": tenant } }),
    ];
    for artifact in fixture.artifacts() {
        let upload = ArtifactUpload::new(
            tenant.id(),
            artifact.name.clone(),
            artifact.kind,
            artifact.content.clone(),
        )?;
        steps.push(json!({
            "method": "/Repo/AddFile",
            "sha256": artifact.sha256,
            "request": upload.to_json(),
        }));
    }
    steps.push(json!({
        "method": "/Control/AddPackage",
        "request": fixture.template().document(),
    }));
    Ok(Value::Array(steps))
}
