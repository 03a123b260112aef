//! JSON-RPC-backed chain adapter
//!
//! Wraps an `alloy` `DynProvider` behind the narrow [`ChainAdapter`]
//! interface (§6.2). Mirrors the way `proxy_utils::get_implement` reads
//! slots and code through a provider, but against the network directly
//! rather than a forked in-memory database.

use super::ChainAdapter;
use crate::errors::ChainError;
use crate::types::{Address, SlotKey};
use alloy::primitives::{Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use async_trait::async_trait;

/// Chain adapter backed by a live JSON-RPC provider.
pub struct RpcChainAdapter {
    provider: DynProvider,
}

impl RpcChainAdapter {
    /// Connects to `rpc_endpoint` (HTTP or WebSocket, auto-detected by alloy).
    pub async fn connect(rpc_endpoint: &str) -> Result<Self, ChainError> {
        let url = rpc_endpoint
            .parse()
            .map_err(|_| ChainError::InvalidEndpoint(rpc_endpoint.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(url);
        Ok(Self {
            provider: DynProvider::new(provider),
        })
    }
}

#[async_trait]
impl ChainAdapter for RpcChainAdapter {
    async fn read_storage_slot(&self, address: Address, slot: SlotKey) -> Result<SlotKey, ChainError> {
        let key = U256::from_be_bytes(slot.0);
        let value = self
            .provider
            .get_storage_at(address, key)
            .await
            .map_err(|e| ChainError::StorageRead {
                address: address.to_string(),
                slot: slot.to_string(),
                reason: e.to_string(),
            })?;
        Ok(SlotKey::from(value.to_be_bytes::<32>()))
    }

    async fn read_code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| ChainError::CodeRead {
                address: address.to_string(),
                reason: e.to_string(),
            })
    }
}
