//! Web server configuration.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Default cap on request body size.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Configuration for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to enable CORS
    pub enable_cors: bool,
    /// Maximum accepted request body in bytes
    pub body_limit: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// The socket to bind; `host` must be an IPv4 or IPv6 literal.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            RelayError::config_error(format!("Invalid bind host '{}': {}", self.host, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Get the full bind address for display.
    pub fn bind_address(&self) -> String {
        match self.socket_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }
}
