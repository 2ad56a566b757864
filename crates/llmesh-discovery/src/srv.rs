//! DNS SRV lookup for agent endpoints.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};

#[async_trait]
pub trait SrvResolver: Send + Sync {
    /// Resolve `name` to `target:port` pairs (targets without the trailing
    /// root dot).
    async fn lookup(&self, name: &str) -> DiscoveryResult<Vec<String>>;
}

/// Resolver backed by the host's DNS configuration.
pub struct HickorySrvResolver {
    resolver: TokioAsyncResolver,
}

impl HickorySrvResolver {
    pub fn from_system_conf() -> DiscoveryResult<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| DiscoveryError::Resolve(e.to_string()))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl SrvResolver for HickorySrvResolver {
    async fn lookup(&self, name: &str) -> DiscoveryResult<Vec<String>> {
        let records = self
            .resolver
            .srv_lookup(name)
            .await
            .map_err(|e| DiscoveryError::Resolve(format!("{name}: {e}")))?;

        let targets: Vec<String> = records
            .iter()
            .map(|srv| {
                let target = srv.target().to_utf8();
                format!("{}:{}", target.trim_end_matches('.'), srv.port())
            })
            .collect();
        debug!(%name, count = targets.len(), "SRV records resolved");
        Ok(targets)
    }
}
