//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Artifact repository client."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::debug;

use crate::channel::ChannelSettings;
use crate::model::ArtifactUpload;
use crate::proto;
use crate::proto::repo_client::RepoClient;
use crate::reply::Reply;
use crate::TransportError;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn add_file(&self, upload: &ArtifactUpload) -> Reply<()>;

    fn close(&mut self);
}

#[derive(Debug)]
pub struct GrpcRepositoryClient {
    endpoint: String,
    inner: Option<RepoClient<Channel>>,
}

impl GrpcRepositoryClient {
    pub async fn connect(settings: &ChannelSettings) -> Result<Self, TransportError> {
        let channel = settings.connect().await?;
        Ok(Self::from_channel(settings.address(), channel))
    }

    pub fn from_channel(endpoint: impl Into<String>, channel: Channel) -> Self {
        Self {
            endpoint: endpoint.into(),
            inner: Some(RepoClient::new(channel)),
        }
    }
}

#[async_trait]
impl Repository for GrpcRepositoryClient {
    async fn add_file(&self, upload: &ArtifactUpload) -> Reply<()> {
        let Some(mut client) = self.inner.clone() else {
            return Reply::unreachable("repository channel closed");
        };
        let request = proto::AddFileRequest::from(upload);
        let reply = Reply::from_rpc(client.add_file(request).await, |_| ());
        debug!(
            endpoint = %self.endpoint,
            artifact = upload.name(),
            bytes = upload.content().len(),
            status = %reply.status,
            "Repo/AddFile"
        );
        reply
    }

    fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!(endpoint = %self.endpoint, "repository channel released");
        }
    }
}
