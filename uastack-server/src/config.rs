// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Server configuration.

use serde::{Deserialize, Serialize};

use uastack_core::config::Config;
use uastack_types::{ApplicationType, UAString};

/// Operational limits of the server. All operation counts follow the
/// "exceeding the limit fails the whole request with BadTooManyOperations"
/// rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,
    /// Maximum number of concurrent secure channels.
    pub max_secure_channels: usize,
    /// Maximum lifetime granted to a channel security token, in milliseconds.
    pub max_security_token_lifetime_ms: u32,
    /// Maximum queued publish requests per session.
    pub max_publish_requests_per_session: usize,
    /// Maximum operations in a single Read request.
    pub max_nodes_per_read: usize,
    /// Maximum operations in a single Write request.
    pub max_nodes_per_write: usize,
    /// Maximum operations in a single Browse request.
    pub max_nodes_per_browse: usize,
    /// Maximum operations in a single Call request.
    pub max_nodes_per_method_call: usize,
    /// Maximum operations in a single node management request.
    pub max_nodes_per_node_management: usize,
    /// Maximum subscriptions per session.
    pub max_subscriptions_per_session: usize,
    /// Maximum monitored items per subscription.
    pub max_monitored_items_per_subscription: usize,
    /// Maximum size of a reassembled message.
    pub max_message_size: usize,
    /// Maximum number of chunks in a message.
    pub max_chunk_count: usize,
    /// Send buffer size.
    pub send_buffer_size: usize,
    /// Receive buffer size.
    pub receive_buffer_size: usize,
    /// Timeout for queued asynchronous operations, in milliseconds. Zero
    /// disables the timeout.
    pub async_operation_timeout_ms: u64,
    /// Maximum number of queued asynchronous operations.
    pub max_async_operation_queue_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_sessions: 20,
            max_secure_channels: 20,
            max_security_token_lifetime_ms: 300_000,
            max_publish_requests_per_session: 10,
            max_nodes_per_read: 1000,
            max_nodes_per_write: 1000,
            max_nodes_per_browse: 1000,
            max_nodes_per_method_call: 100,
            max_nodes_per_node_management: 1000,
            max_subscriptions_per_session: 10,
            max_monitored_items_per_subscription: 1000,
            max_message_size: uastack_types::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: uastack_types::constants::MAX_CHUNK_COUNT,
            send_buffer_size: uastack_types::constants::SEND_BUFFER_SIZE,
            receive_buffer_size: uastack_types::constants::RECEIVE_BUFFER_SIZE,
            async_operation_timeout_ms: 120_000,
            max_async_operation_queue_size: 100,
        }
    }
}

/// An endpoint the server listens on: a path plus security settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Path of the endpoint, e.g. "/".
    pub path: String,
    /// Security policy, by its short name, e.g. "None" or "Basic256Sha256".
    pub security_policy: String,
    /// Security mode: "None", "Sign" or "SignAndEncrypt".
    pub security_mode: String,
}

impl ServerEndpoint {
    /// An endpoint without security.
    pub fn none(path: &str) -> ServerEndpoint {
        ServerEndpoint {
            path: path.to_string(),
            security_policy: "None".to_string(),
            security_mode: "None".to_string(),
        }
    }
}

/// The server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Human readable application name.
    pub application_name: String,
    /// Application uri, should be unique per installation.
    pub application_uri: String,
    /// Product uri of the vendor.
    pub product_uri: String,
    /// Hostname to listen on.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// The endpoints offered.
    pub endpoints: Vec<ServerEndpoint>,
    /// Operational limits.
    pub limits: Limits,
    /// Maximum session timeout granted to clients, in milliseconds.
    pub max_session_timeout_ms: u64,
    /// Timeout for the HELLO message after a TCP connect.
    pub hello_timeout_ms: u64,
    /// Number of async worker threads, 0 to process async operations on the
    /// main loop.
    pub async_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_name: "uastack server".to_string(),
            application_uri: "urn:uastack:server".to_string(),
            product_uri: "urn:uastack".to_string(),
            host: "127.0.0.1".to_string(),
            port: uastack_types::constants::DEFAULT_OPC_UA_SERVER_PORT,
            endpoints: vec![ServerEndpoint::none("/")],
            limits: Limits::default(),
            max_session_timeout_ms: 300_000,
            hello_timeout_ms: 5_000,
            async_workers: 0,
        }
    }
}

impl Config for ServerConfig {
    fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.application_uri.is_empty() {
            errors.push("Application uri is empty".to_string());
        }
        if self.endpoints.is_empty() {
            errors.push("Server has no endpoints".to_string());
        }
        if self.limits.max_sessions == 0 {
            errors.push("Max sessions must be at least 1".to_string());
        }
        errors
    }

    fn application_name(&self) -> UAString {
        UAString::from(&self.application_name)
    }

    fn application_uri(&self) -> UAString {
        UAString::from(&self.application_uri)
    }

    fn product_uri(&self) -> UAString {
        UAString::from(&self.product_uri)
    }

    fn application_type(&self) -> ApplicationType {
        ApplicationType::Server
    }

    fn discovery_urls(&self) -> Option<Vec<UAString>> {
        Some(vec![UAString::from(self.base_endpoint_url())])
    }
}

impl ServerConfig {
    /// The base url of the server, e.g. `opc.tcp://localhost:4840`.
    pub fn base_endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.host, self.port)
    }
}
