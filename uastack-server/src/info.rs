// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Shared server state that is safe to access from any task: configuration,
//! certificates and endpoint descriptions.

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use uastack_core::{config::Config, profiles};
use uastack_crypto::{CertificateStore, PrivateKey, SecurityPolicy, X509};
use uastack_types::{
    ByteString, DateTime, EndpointDescription, MessageSecurityMode, UAString, UserTokenPolicy,
};

use crate::config::ServerConfig;

/// Immutable-ish information about the running server shared between
/// connections.
pub struct ServerInfo {
    /// The server configuration.
    pub config: ServerConfig,
    /// The time the server started.
    pub start_time: DateTime,
    /// The certificate store with trust information.
    pub certificate_store: Arc<RwLock<CertificateStore>>,
    /// The server certificate, if one is configured.
    pub server_certificate: Option<X509>,
    /// The server private key, if one is configured.
    pub server_pkey: Option<PrivateKey>,
}

impl ServerInfo {
    /// Create server info from a config and certificate store.
    pub fn new(config: ServerConfig, certificate_store: Arc<RwLock<CertificateStore>>) -> Self {
        let (server_certificate, server_pkey) = {
            let store = certificate_store.read();
            (store.read_own_cert().ok(), store.read_own_pkey().ok())
        };
        Self {
            config,
            start_time: DateTime::now(),
            certificate_store,
            server_certificate,
            server_pkey,
        }
    }

    /// The server certificate as a byte string, null when unconfigured.
    pub fn server_certificate_as_byte_string(&self) -> ByteString {
        self.server_certificate
            .as_ref()
            .map(|c| c.as_byte_string())
            .unwrap_or_else(ByteString::null)
    }

    /// The urls of all configured endpoints.
    pub fn endpoint_urls(&self) -> Vec<String> {
        self.config
            .endpoints
            .iter()
            .map(|e| {
                let path = e.path.trim_start_matches('/');
                if path.is_empty() {
                    self.config.base_endpoint_url()
                } else {
                    format!("{}/{}", self.config.base_endpoint_url(), path)
                }
            })
            .collect()
    }

    /// Endpoint descriptions advertised in CreateSession responses.
    pub fn endpoint_descriptions(&self) -> Vec<EndpointDescription> {
        let application = self.config.application_description();
        self.config
            .endpoints
            .iter()
            .zip(self.endpoint_urls())
            .filter_map(|(endpoint, url)| {
                let policy = SecurityPolicy::from_str(&endpoint.security_policy).ok()?;
                if policy == SecurityPolicy::Unknown {
                    return None;
                }
                let mode = match endpoint.security_mode.as_str() {
                    "None" => MessageSecurityMode::None,
                    "Sign" => MessageSecurityMode::Sign,
                    "SignAndEncrypt" => MessageSecurityMode::SignAndEncrypt,
                    _ => return None,
                };
                Some(EndpointDescription {
                    endpoint_url: UAString::from(url),
                    server: application.clone(),
                    server_certificate: self.server_certificate_as_byte_string(),
                    security_mode: mode,
                    security_policy_uri: UAString::from(policy.to_uri()),
                    user_identity_tokens: Some(vec![UserTokenPolicy::anonymous()]),
                    transport_profile_uri: UAString::from(profiles::TRANSPORT_PROFILE_URI_BINARY),
                    security_level: match mode {
                        MessageSecurityMode::SignAndEncrypt => 3,
                        MessageSecurityMode::Sign => 2,
                        _ => 0,
                    },
                })
            })
            .collect()
    }

    /// Test whether an endpoint exists with the given url, policy and mode.
    pub fn endpoint_exists(
        &self,
        endpoint_url: &str,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> bool {
        self.endpoint_descriptions().iter().any(|e| {
            e.security_policy_uri.as_ref() == security_policy.to_uri()
                && e.security_mode == security_mode
                && url_matches(e.endpoint_url.as_ref(), endpoint_url)
        })
    }
}

// Endpoint matching ignores a trailing slash; hostname aliasing is the
// host's concern.
fn url_matches(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
