use serde::Deserialize;
use std::net::SocketAddr;

/// MCP tool server configuration, loaded from `PUSHBUTAN_MCP_*` env vars.
#[derive(Debug, Deserialize)]
pub struct ToolboxServerConfig {
    /// Listen address (default: 127.0.0.1:8080)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Path to a TLS certificate (enables HTTPS together with `tls_key`).
    pub tls_cert: Option<String>,

    /// Path to the TLS private key.
    pub tls_key: Option<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for ToolboxServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl ToolboxServerConfig {
    /// Returns the TLS cert/key pair when both are configured.
    #[must_use]
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
