//! Network readiness probe based on resolving the broker address.

use super::NetworkMonitor;
use futures::future::BoxFuture;
use log::debug;

/// Treats the network as up once the broker host resolves to an address.
#[derive(Debug, Clone)]
pub struct ResolveProbe {
    host: String,
    port: u16,
}

impl ResolveProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    async fn resolves(&self) -> bool {
        match tokio::net::lookup_host((self.host.as_str(), self.port)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!("Cannot resolve {}: {}", self.host, e);
                false
            }
        }
    }
}

impl NetworkMonitor for ResolveProbe {
    fn is_connected(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.resolves())
    }
}
