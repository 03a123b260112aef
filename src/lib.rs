//! # upgrade-safety-analyzer
//!
//! Deterministic upgrade-safety analysis for proxy-based smart contracts on
//! an EVM-compatible chain. Given a deployed proxy address, an old and a
//! new implementation's compiled artifacts, and a JSON-RPC endpoint, the
//! engine decides whether replacing the proxy's implementation would
//! corrupt storage, break the external interface, or weaken access
//! controls.
//!
//! ## Scope
//!
//! This crate is the analysis core: proxy classification, storage-layout
//! diffing, interface diffing, upgrade-authorization checks, initializer
//! checks, access-control-regression checks, and verdict aggregation. It
//! treats the Solidity toolchain ([`oracle`]) and the chain RPC endpoint
//! ([`chain`]) as narrow external collaborators rather than owning them.
//!
//! ## Entry point
//!
//! [`engine::analyze`] is the single operation external callers invoke. It
//! takes a [`oracle::ArtifactOracle`], a [`chain::ChainAdapter`], and a
//! [`config::EngineRequest`], and returns a [`types::EngineResult`].

pub mod chain;
pub mod config;
pub mod engine;
pub mod errors;
pub mod oracle;
pub mod report;
pub mod types;

pub use config::EngineRequest;
pub use engine::analyze;
pub use errors::AnalysisError;
pub use types::{EngineResult, Verdict};

// Re-exported for convenience so downstream crates pin a single `alloy` version.
pub use alloy;
