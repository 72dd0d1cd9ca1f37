//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Endpoint resolution and channel establishment for boundary clients."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::time::Duration;

use jobload_common::{SecurityMode, TargetConfig};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;
use url::Url;

use crate::TransportError;

/// Address and transport parameters for one platform boundary.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    address: String,
    security: SecurityMode,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ChannelSettings {
    pub fn new(
        address: impl Into<String>,
        security: SecurityMode,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            security,
            connect_timeout,
            request_timeout,
        }
    }

    pub fn control(target: &TargetConfig) -> Self {
        Self::for_address(target, &target.control)
    }

    pub fn repository(target: &TargetConfig) -> Self {
        Self::for_address(target, &target.repository)
    }

    pub fn listener(target: &TargetConfig) -> Self {
        Self::for_address(target, &target.listener)
    }

    fn for_address(target: &TargetConfig, address: &str) -> Self {
        Self::new(
            address,
            target.security,
            target.connect_timeout,
            target.request_timeout,
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn security(&self) -> SecurityMode {
        self.security
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Resolve `host:port` (or a full URL) to a URL whose scheme follows the security mode.
    pub fn url(&self) -> Result<Url, TransportError> {
        let raw = self.address.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            let scheme = if self.security.is_tls() { "https" } else { "http" };
            format!("{scheme}://{raw}")
        };
        let url = Url::parse(&candidate).map_err(|err| TransportError::InvalidEndpoint {
            endpoint: self.address.clone(),
            reason: err.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint {
                endpoint: self.address.clone(),
                reason: "missing host".into(),
            });
        }
        Ok(url)
    }

    /// Build the tonic endpoint without dialling.
    pub fn endpoint(&self) -> Result<Endpoint, TransportError> {
        let url = self.url()?;
        let invalid = |reason: String| TransportError::InvalidEndpoint {
            endpoint: self.address.clone(),
            reason,
        };
        let mut endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|err| invalid(err.to_string()))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);
        if self.security.is_tls() {
            let domain = url.host_str().unwrap_or_default().to_string();
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().domain_name(domain))
                .map_err(|source| TransportError::Tls {
                    endpoint: self.address.clone(),
                    source,
                })?;
        }
        Ok(endpoint)
    }

    /// Dial the boundary. Fails when the peer cannot be reached within the connect timeout.
    pub async fn connect(&self) -> Result<Channel, TransportError> {
        let endpoint = self.endpoint()?;
        debug!(endpoint = %self.address, tls = self.security.is_tls(), "dialling boundary");
        endpoint
            .connect()
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: self.address.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(address: &str, security: SecurityMode) -> ChannelSettings {
        ChannelSettings::new(
            address,
            security,
            Duration::from_millis(200),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn bare_addresses_take_scheme_from_security_mode() {
        let plain = settings("localhost:50051", SecurityMode::Plaintext);
        assert_eq!(plain.url().unwrap().as_str(), "http://localhost:50051/");
        let tls = settings("platform.example:443", SecurityMode::Tls);
        assert_eq!(tls.url().unwrap().scheme(), "https");
    }

    #[test]
    fn explicit_scheme_is_preserved() {
        let settings = settings("http://127.0.0.1:8080", SecurityMode::Tls);
        assert_eq!(settings.url().unwrap().scheme(), "http");
    }

    #[test]
    fn garbage_address_is_rejected() {
        let settings = settings("bad host:1", SecurityMode::Plaintext);
        assert!(matches!(
            settings.url(),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn connecting_to_a_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let settings = settings(&addr.to_string(), SecurityMode::Plaintext);
        assert!(matches!(
            settings.connect().await,
            Err(TransportError::Connect { .. })
        ));
    }
}
