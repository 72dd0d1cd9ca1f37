//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "tests"
//! jl_type: "test"
//! jl_scope: "code"
//! jl_description: "In-process fake platform shared by harness integration tests."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use jobload_common::{ArtifactKind, SecurityMode, TargetConfig};
use jobload_harness::{FixtureSet, HarnessContext, LoadedArtifact, PackageTemplate};
use jobload_metrics::new_registry;
use jobload_transport::proto;
use jobload_transport::proto::control_server::{Control, ControlServer};
use jobload_transport::proto::repo_server::{Repo, RepoServer};
use jobload_transport::{
    Connector, ControlPlane, EventEnvelope, EventSink, PlatformConnector, Repository, Tenant,
    TransportError,
};
use tokio::sync::watch;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

pub const TEMPLATE: &str = r#"
package:
  ID: job_pkg_1
  name: Job Package
  tenant: tenant_1
  queues:
    - ID: queue_1
      name: Queue One
  jobs:
    - event:
        ID: event_id_1
        name: event
        supplierqueue: queue_1
        runtime: run1
        schema:
          ID: sch1
          name: schema
  runtimes:
    - ID: run1
      name: echo
      moduleref: run1
      mainfuncname: event
"#;

pub const TENANTS: &str = "Tenants";
pub const ADD_TENANT: &str = "AddTenant";
pub const ADD_FILE: &str = "AddFile";
pub const ADD_PACKAGE: &str = "AddPackage";

/// Platform state plus toggles for injecting rejections.
#[derive(Default, Clone)]
pub struct FakePlatform {
    pub tenants: Arc<Mutex<Vec<proto::Tenant>>>,
    pub files: Arc<Mutex<Vec<proto::TenantFile>>>,
    pub packages: Arc<Mutex<Vec<proto::JobPackage>>>,
    pub events: Arc<Mutex<Vec<(String, String, EventEnvelope)>>>,
    pub add_tenant_calls: Arc<AtomicUsize>,
    pub reject_uploads: Arc<AtomicBool>,
    pub fail_lookup: Arc<AtomicBool>,
    /// Boundary methods in the order the platform received them.
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl FakePlatform {
    pub fn file_kinds(&self) -> Vec<(String, i32)> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .filter_map(|tf| tf.file.as_ref().map(|f| (f.name.clone(), f.r#type)))
            .collect()
    }

    pub fn package_ids(&self) -> Vec<String> {
        self.packages
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[tonic::async_trait]
impl Control for FakePlatform {
    async fn tenants(
        &self,
        request: Request<proto::TenantsRequest>,
    ) -> Result<Response<proto::TenantsReply>, Status> {
        self.log(TENANTS);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(Status::unavailable("control plane warming up"));
        }
        let wanted = request.into_inner().id;
        let tenants = self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .filter(|t| wanted.as_deref().map_or(true, |id| t.id == id))
            .cloned()
            .collect();
        Ok(Response::new(proto::TenantsReply { tenants }))
    }

    async fn add_tenant(
        &self,
        request: Request<proto::AddTenantRequest>,
    ) -> Result<Response<proto::AddTenantReply>, Status> {
        self.log(ADD_TENANT);
        self.add_tenant_calls.fetch_add(1, Ordering::SeqCst);
        let tenant = request
            .into_inner()
            .tenant
            .ok_or_else(|| Status::invalid_argument("tenant missing"))?;
        self.tenants.lock().unwrap().push(tenant.clone());
        Ok(Response::new(proto::AddTenantReply {
            tenant: Some(tenant),
        }))
    }

    async fn add_package(
        &self,
        request: Request<proto::AddPackageRequest>,
    ) -> Result<Response<proto::AddPackageReply>, Status> {
        self.log(ADD_PACKAGE);
        let package = request
            .into_inner()
            .package
            .ok_or_else(|| Status::invalid_argument("package missing"))?;
        let mut packages = self.packages.lock().unwrap();
        if packages.iter().any(|p| p.id == package.id) {
            return Err(Status::already_exists("package id taken"));
        }
        packages.push(package.clone());
        Ok(Response::new(proto::AddPackageReply {
            package: Some(package),
        }))
    }
}

#[tonic::async_trait]
impl Repo for FakePlatform {
    async fn add_file(
        &self,
        request: Request<proto::AddFileRequest>,
    ) -> Result<Response<proto::AddFileReply>, Status> {
        self.log(ADD_FILE);
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(Status::internal("storage offline"));
        }
        let file = request
            .into_inner()
            .tenant_file
            .ok_or_else(|| Status::invalid_argument("file missing"))?;
        self.files.lock().unwrap().push(file);
        Ok(Response::new(proto::AddFileReply {}))
    }
}

async fn ingest(
    State(platform): State<FakePlatform>,
    Path((tenant, event_type)): Path<(String, String)>,
    Json(envelope): Json<EventEnvelope>,
) -> StatusCode {
    let known = platform
        .tenants
        .lock()
        .unwrap()
        .iter()
        .any(|t| t.id == tenant);
    if !known {
        return StatusCode::NOT_FOUND;
    }
    platform
        .events
        .lock()
        .unwrap()
        .push((tenant, event_type, envelope));
    StatusCode::OK
}

/// Running fake platform: gRPC on one port, HTTP listener on another.
pub struct PlatformHandle {
    pub platform: FakePlatform,
    pub grpc: SocketAddr,
    pub http: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl PlatformHandle {
    pub async fn spawn(platform: FakePlatform) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let grpc_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let grpc = grpc_listener.local_addr().unwrap();
        let incoming = TcpIncoming::from_listener(grpc_listener, true, None).unwrap();
        let mut grpc_rx = shutdown_rx.clone();
        let services = platform.clone();
        tokio::spawn(async move {
            Server::builder()
                .add_service(ControlServer::new(services.clone()))
                .add_service(RepoServer::new(services))
                .serve_with_incoming_shutdown(incoming, async move {
                    let _ = grpc_rx.changed().await;
                })
                .await
                .unwrap();
        });

        let http_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http = http_listener.local_addr().unwrap();
        let app = Router::new()
            .route("/events/:tenant/:event", post(ingest))
            .with_state(platform.clone());
        let mut http_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_rx.changed().await;
                })
                .await
                .unwrap();
        });

        Self {
            platform,
            grpc,
            http,
            shutdown,
        }
    }

    pub fn target(&self) -> TargetConfig {
        TargetConfig {
            control: self.grpc.to_string(),
            repository: self.grpc.to_string(),
            listener: self.http.to_string(),
            security: SecurityMode::Plaintext,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Wraps a connector and counts how many control channels were opened.
pub struct CountingConnector {
    inner: PlatformConnector,
    pub control_opens: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub fn new(target: &TargetConfig) -> Self {
        Self {
            inner: PlatformConnector::new(target),
            control_opens: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn control(&self) -> Result<Box<dyn ControlPlane>, TransportError> {
        self.control_opens.fetch_add(1, Ordering::SeqCst);
        self.inner.control().await
    }

    async fn repository(&self) -> Result<Box<dyn Repository>, TransportError> {
        self.inner.repository().await
    }

    fn events(&self) -> Result<Arc<dyn EventSink>, TransportError> {
        self.inner.events()
    }
}

pub fn fixture() -> FixtureSet {
    FixtureSet::new(
        vec![
            LoadedArtifact::new(
                "run1",
                ArtifactKind::Module,
                Bytes::from_static(b"\0asm\x01\0\0\0"),
            ),
            LoadedArtifact::new(
                "sch1",
                ArtifactKind::Schema,
                Bytes::from_static(br#"{"type":"object"}"#),
            ),
        ],
        PackageTemplate::parse(TEMPLATE, "inline").unwrap(),
    )
}

pub fn context(connector: Arc<dyn Connector>) -> HarnessContext {
    HarnessContext::new(
        Tenant::new("tenant_1", "tenant_1").unwrap(),
        "event_id_1",
        fixture(),
        connector,
        &new_registry(),
    )
    .unwrap()
}
