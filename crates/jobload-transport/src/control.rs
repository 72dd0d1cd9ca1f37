//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Control-plane client: tenant lookup, tenant creation and package submission."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::debug;

use crate::channel::ChannelSettings;
use crate::model::{JobPackage, PackageDocument, Tenant};
use crate::proto;
use crate::proto::control_client::ControlClient;
use crate::reply::Reply;
use crate::TransportError;

/// Operations exposed by the control-plane boundary.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Tenants matching `id`; an empty body means the tenant is unknown.
    async fn tenants(&self, id: &str) -> Reply<Vec<Tenant>>;

    async fn add_tenant(&self, tenant: &Tenant) -> Reply<Tenant>;

    async fn add_package(&self, document: &PackageDocument) -> Reply<JobPackage>;

    /// Release the underlying channel. Calls made afterwards report `Unreachable`.
    fn close(&mut self);
}

/// tonic-backed control-plane client bound to one channel.
#[derive(Debug)]
pub struct GrpcControlClient {
    endpoint: String,
    inner: Option<ControlClient<Channel>>,
}

impl GrpcControlClient {
    pub async fn connect(settings: &ChannelSettings) -> Result<Self, TransportError> {
        let channel = settings.connect().await?;
        Ok(Self::from_channel(settings.address(), channel))
    }

    pub fn from_channel(endpoint: impl Into<String>, channel: Channel) -> Self {
        Self {
            endpoint: endpoint.into(),
            inner: Some(ControlClient::new(channel)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn client(&self) -> Option<ControlClient<Channel>> {
        self.inner.clone()
    }
}

const CLOSED: &str = "control channel closed";

#[async_trait]
impl ControlPlane for GrpcControlClient {
    async fn tenants(&self, id: &str) -> Reply<Vec<Tenant>> {
        let Some(mut client) = self.client() else {
            return Reply::unreachable(CLOSED);
        };
        let request = proto::TenantsRequest {
            id: Some(id.to_string()),
        };
        let reply = Reply::from_rpc(client.tenants(request).await, |body| {
            body.tenants.into_iter().map(Tenant::from).collect()
        });
        debug!(endpoint = %self.endpoint, tenant = id, status = %reply.status, "Control/Tenants");
        reply
    }

    async fn add_tenant(&self, tenant: &Tenant) -> Reply<Tenant> {
        let Some(mut client) = self.client() else {
            return Reply::unreachable(CLOSED);
        };
        let request = proto::AddTenantRequest {
            tenant: Some(tenant.into()),
        };
        let fallback = tenant.clone();
        let reply = Reply::from_rpc(client.add_tenant(request).await, move |body| {
            body.tenant.map(Tenant::from).unwrap_or(fallback)
        });
        debug!(endpoint = %self.endpoint, tenant = tenant.id(), status = %reply.status, "Control/AddTenant");
        reply
    }

    async fn add_package(&self, document: &PackageDocument) -> Reply<JobPackage> {
        let Some(mut client) = self.client() else {
            return Reply::unreachable(CLOSED);
        };
        let request = proto::AddPackageRequest::from(document);
        let fallback = document.package.clone();
        let reply = Reply::from_rpc(client.add_package(request).await, move |body| {
            body.package.map(JobPackage::from).unwrap_or(fallback)
        });
        debug!(
            endpoint = %self.endpoint,
            package = %document.package.id,
            status = %reply.status,
            "Control/AddPackage"
        );
        reply
    }

    fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!(endpoint = %self.endpoint, "control channel released");
        }
    }
}
