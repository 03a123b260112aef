//! Chain adapter interface (C2, §6.2)
//!
//! Two read-only methods, no nonces, gas, signatures, or write calls: the
//! engine only ever needs the value of a storage slot or the runtime
//! bytecode at an address, both at the chain head. [`rpc`] supplies the
//! concrete, JSON-RPC-backed implementation built on `alloy`'s provider.

pub mod rpc;

use crate::errors::ChainError;
use crate::types::{Address, SlotKey};
use alloy::primitives::Bytes;
use async_trait::async_trait;

/// The narrow read surface the engine consumes from the EVM JSON-RPC endpoint.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The value of `slot` at `address`, at the chain head.
    async fn read_storage_slot(&self, address: Address, slot: SlotKey) -> Result<SlotKey, ChainError>;

    /// The runtime bytecode at `address`; empty if none is deployed.
    async fn read_code(&self, address: Address) -> Result<Bytes, ChainError>;
}
