//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "HTTP client for the event-ingestion listener."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::channel::ChannelSettings;
use crate::model::EventEnvelope;
use crate::reply::{CallStatus, Reply};
use crate::TransportError;

/// Destination for synthetic events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// POST `envelope` to `/events/{tenant}/{event_type}`. The reply carries the HTTP status.
    async fn send(&self, tenant: &str, event_type: &str, envelope: &EventEnvelope) -> Reply<()>;
}

/// reqwest-backed sink. One instance is shared by every actor of a run.
#[derive(Debug, Clone)]
pub struct HttpEventClient {
    client: Client,
    base: Url,
}

impl HttpEventClient {
    /// Validate the listener address and build the client; nothing is dialled here.
    pub fn connect(settings: &ChannelSettings) -> Result<Self, TransportError> {
        let base = settings.url()?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidEndpoint {
                endpoint: settings.address().to_string(),
                reason: "listener address cannot carry a path".into(),
            });
        }
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .map_err(|source| TransportError::HttpClient {
                endpoint: settings.address().to_string(),
                source,
            })?;
        Ok(Self { client, base })
    }

    /// Ingestion URL for a tenant/event-type pair, with both segments percent-encoded.
    pub fn event_url(&self, tenant: &str, event_type: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["events", tenant, event_type]);
        }
        url
    }
}

#[async_trait]
impl EventSink for HttpEventClient {
    async fn send(&self, tenant: &str, event_type: &str, envelope: &EventEnvelope) -> Reply<()> {
        let url = self.event_url(tenant, event_type);
        let result = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(envelope)
            .send()
            .await;
        let reply = match result {
            Ok(response) => Reply {
                status: CallStatus::Http(response.status().as_u16()),
                body: Some(()),
            },
            Err(err) => Reply::unreachable(err.to_string()),
        };
        debug!(url = %url, status = %reply.status, "event posted");
        reply
    }
}
