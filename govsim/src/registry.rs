use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use alloy::providers::ReqwestProvider;
use alloy::transports::http::{Client, Http};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::provider::CachedProvider;

pub type HttpCachedProvider = CachedProvider<ReqwestProvider, Http<Client>>;

/// One chain the tooling may read from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChainEndpoint {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoint.
    pub rpc_url: Url,
}

/// On-disk registry configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegistryConfig {
    pub chains: Vec<ChainEndpoint>,
}

impl RegistryConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read chain config {}", path.display()))?;
        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        serde_path_to_error::deserialize(&mut deserializer)
            .with_context(|| format!("malformed chain config {}", path.display()))
    }
}

/// Cached providers keyed by chain id.
///
/// Built once at startup from [`RegistryConfig`] and passed by reference
/// into whatever needs chain access; chains absent from the registry are
/// refused rather than dialled ad hoc.
#[derive(Default)]
pub struct ChainRegistry {
    providers: BTreeMap<u64, Arc<HttpCachedProvider>>,
}

impl ChainRegistry {
    pub fn from_config(config: &RegistryConfig) -> Self {
        let mut registry = Self::default();
        for endpoint in &config.chains {
            info!(chain_id = endpoint.chain_id, "registering chain endpoint");
            registry.register(
                endpoint.chain_id,
                Arc::new(CachedProvider::new(ReqwestProvider::new_http(
                    endpoint.rpc_url.clone(),
                ))),
            );
        }
        registry
    }

    pub fn register(&mut self, chain_id: u64, provider: Arc<HttpCachedProvider>) {
        self.providers.insert(chain_id, provider);
    }

    pub fn provider(&self, chain_id: u64) -> anyhow::Result<Arc<HttpCachedProvider>> {
        self.providers
            .get(&chain_id)
            .cloned()
            .with_context(|| format!("no RPC endpoint configured for chain {chain_id}"))
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.providers.keys().copied()
    }
}
