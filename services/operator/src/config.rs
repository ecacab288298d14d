use std::net::SocketAddr;

use anyhow::Result;

/// Operator configuration, read from the environment.
///
/// TLS for the webhook listener is terminated by the deployment (sidecar or
/// ingress), so only plain listen addresses appear here.
#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_listen_addr: SocketAddr,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let webhook_listen_addr = std::env::var("SCANWARD_WEBHOOK_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()?;

        let log_level = std::env::var("SCANWARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            webhook_listen_addr,
            log_level,
        })
    }
}
