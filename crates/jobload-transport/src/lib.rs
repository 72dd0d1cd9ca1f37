//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Boundary clients for the control plane, artifact repository and event listener."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
//! Each client exposes its operations as typed messages and reports every call as a
//! [`Reply`]; boundary failures are data, never panics or errors.

use std::sync::Arc;

use async_trait::async_trait;
use jobload_common::TargetConfig;
use thiserror::Error;

pub mod channel;
pub mod control;
pub mod events;
pub mod model;
pub mod reply;
pub mod repository;

#[allow(missing_docs)]
pub mod proto {
    tonic::include_proto!("_");
}

pub use channel::ChannelSettings;
pub use control::{ControlPlane, GrpcControlClient};
pub use events::{EventSink, HttpEventClient};
pub use model::{
    ArtifactUpload, EventDefinition, EventEnvelope, EventRecord, JobDefinition, JobPackage,
    PackageDocument, QueueDefinition, ResultDefinition, RuntimeDefinition, SchemaReference,
    Tenant,
};
pub use reply::{CallStatus, Expectation, Reply};
pub use repository::{GrpcRepositoryClient, Repository};

/// Errors raised while establishing a boundary client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("tls configuration rejected for {endpoint}: {source}")]
    Tls {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("http client for {endpoint} could not be built: {source}")]
    HttpClient {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Opens clients against the three platform boundaries.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn control(&self) -> Result<Box<dyn ControlPlane>, TransportError>;

    async fn repository(&self) -> Result<Box<dyn Repository>, TransportError>;

    /// Shared event sink; HTTP clients pool connections internally.
    fn events(&self) -> Result<Arc<dyn EventSink>, TransportError>;
}

/// Connector for a live platform described by a [`TargetConfig`].
#[derive(Debug, Clone)]
pub struct PlatformConnector {
    control: ChannelSettings,
    repository: ChannelSettings,
    listener: ChannelSettings,
}

impl PlatformConnector {
    pub fn new(target: &TargetConfig) -> Self {
        Self {
            control: ChannelSettings::control(target),
            repository: ChannelSettings::repository(target),
            listener: ChannelSettings::listener(target),
        }
    }

    /// Resolve every boundary address without dialling, surfacing malformed endpoints early.
    pub fn validate(&self) -> Result<(), TransportError> {
        self.control.endpoint()?;
        self.repository.endpoint()?;
        self.listener.url()?;
        Ok(())
    }
}

#[async_trait]
impl Connector for PlatformConnector {
    async fn control(&self) -> Result<Box<dyn ControlPlane>, TransportError> {
        Ok(Box::new(GrpcControlClient::connect(&self.control).await?))
    }

    async fn repository(&self) -> Result<Box<dyn Repository>, TransportError> {
        Ok(Box::new(GrpcRepositoryClient::connect(&self.repository).await?))
    }

    fn events(&self) -> Result<Arc<dyn EventSink>, TransportError> {
        Ok(Arc::new(HttpEventClient::connect(&self.listener)?))
    }
}
