//! Artifact oracle adapter (C1, §6.1)
//!
//! The engine treats the Solidity toolchain as an oracle invoked through a
//! narrow interface: a health probe, a build step, and three fetch
//! capabilities keyed by `(project_root, source_file, contract_name)`. This
//! module defines that interface (`ArtifactOracle`) plus the raw JSON
//! shapes the oracle returns; [`foundry`] supplies the concrete,
//! subprocess-backed implementation.

pub mod foundry;

use crate::errors::OracleError;
use crate::types::{Abi, ContractAst, StorageLayout};
use async_trait::async_trait;
use serde::Deserialize;

/// Keys one artifact request to a specific contract in a specific source file.
#[derive(Debug, Clone)]
pub struct ArtifactKey {
    pub project_root: String,
    pub source_path: String,
    pub contract_name: String,
}

/// The narrow interface the engine consumes from the Solidity toolchain.
///
/// All three fetch capabilities implicitly require `build` to have run
/// successfully first; callers (the resolver, C4) are responsible for
/// sequencing that.
#[async_trait]
pub trait ArtifactOracle: Send + Sync {
    /// Health probe: the toolchain binary is present and runnable.
    async fn probe(&self) -> Result<(), OracleError>;

    /// Compiles every contract under `project_root`.
    async fn build(&self, project_root: &str) -> Result<(), OracleError>;

    /// Normalized, declaration-ordered storage layout for one contract.
    async fn fetch_storage_layout(&self, key: &ArtifactKey) -> Result<StorageLayout, OracleError>;

    /// The contract's external interface (functions + events).
    async fn fetch_abi(&self, key: &ArtifactKey) -> Result<Abi, OracleError>;

    /// The contract's AST, projected down to the function declarations the
    /// engine's analyzers need.
    async fn fetch_ast(&self, key: &ArtifactKey) -> Result<ContractAst, OracleError>;
}

/// Raw shape of one storage-layout entry, before alias normalization.
///
/// Mirrors §6.1: `{label, offset, slot: hex-string, type_id,
/// declaring_contract: "path:Name"}` plus a separate `type_id -> {encoding,
/// human_label, byte_size}` dictionary.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStorageEntry {
    pub label: String,
    pub offset: u8,
    pub slot: String,
    pub type_id: String,
    pub declaring_contract: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTypeInfo {
    #[allow(dead_code)]
    pub encoding: String,
    pub human_label: String,
    pub byte_size: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStorageLayout {
    pub storage: Vec<RawStorageEntry>,
    pub types: std::collections::BTreeMap<String, RawTypeInfo>,
}

/// Raw shape of one ABI item, exactly as the toolchain emits it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAbiItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<RawAbiParam>,
    #[serde(default)]
    pub outputs: Vec<RawAbiParam>,
    #[serde(rename = "stateMutability")]
    pub state_mutability: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAbiParam {
    #[allow(dead_code)]
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(rename = "internalType")]
    pub internal_type: Option<String>,
    pub indexed: Option<bool>,
}

/// Raw shape of one modifier invocation attached to a function definition:
/// `{modifierName: {name}}`, a nested shape rather than a flat string.
#[derive(Debug, Clone, Deserialize)]
pub struct RawModifierInvocation {
    #[serde(rename = "modifierName")]
    pub modifier_name: RawModifierName,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawModifierName {
    pub name: String,
}

/// Normalizes a toolchain type alias to its canonical form (e.g. `uint` ->
/// `uint256`, `int` -> `int256`, `function` -> `bytes24`). Left unchanged if
/// already canonical or not one of the known abbreviations.
pub fn normalize_canonical_type(human_label: &str) -> String {
    match human_label {
        "uint" => "uint256".to_string(),
        "int" => "int256".to_string(),
        other => other.to_string(),
    }
}
