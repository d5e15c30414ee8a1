//! Server configuration.
//!
//! Endpoint fields are identity/display metadata handed to the transport
//! layer; the core itself performs no network IO.

use serde::{Deserialize, Serialize};

use railgrid_gate::CredentialTable;

/// Namespace URI registered when none is configured.
pub const DEFAULT_NAMESPACE_URI: &str = "http://railwaycorp.eu";

/// Where the transport layer should expose this server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub hostname: String,
    pub port: u16,
    /// URL path segment, leading and trailing slash included.
    pub path: String,
    /// Human-readable server name for discovery/display.
    pub server_name: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 4840, // the registered OPC UA port
            path: "/railway/".to_string(),
            server_name: "Railgrid OPC UA Server".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Render the `opc.tcp` endpoint URL.
    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}{}", self.hostname, self.port, self.path)
    }
}

/// Everything `Server::start` needs.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub endpoint: EndpointConfig,
    /// Application namespace URI; empty means [`DEFAULT_NAMESPACE_URI`].
    pub namespace_uri: String,
    /// Configured accounts. `None` (or an empty table) selects the
    /// open-access policy: anonymous sessions with write capability.
    pub credentials: Option<CredentialTable>,
}

impl ServerConfig {
    pub fn namespace_uri(&self) -> &str {
        if self.namespace_uri.is_empty() {
            DEFAULT_NAMESPACE_URI
        } else {
            &self.namespace_uri
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let endpoint = EndpointConfig::default();
        assert_eq!(endpoint.endpoint_url(), "opc.tcp://localhost:4840/railway/");

        let custom = EndpointConfig {
            hostname: "plc01".to_string(),
            port: 14840,
            path: "/yard/".to_string(),
            ..EndpointConfig::default()
        };
        assert_eq!(custom.endpoint_url(), "opc.tcp://plc01:14840/yard/");
    }

    #[test]
    fn test_default_namespace_fallback() {
        let config = ServerConfig::default();
        assert_eq!(config.namespace_uri(), DEFAULT_NAMESPACE_URI);

        let config = ServerConfig {
            namespace_uri: "http://example.org/app".to_string(),
            ..ServerConfig::default()
        };
        assert_eq!(config.namespace_uri(), "http://example.org/app");
    }
}
