//! Error types for upgrade-safety analysis
//!
//! This module defines the error taxonomy at the engine boundary (§7):
//! - Typed errors that abort the whole analysis (`AnalysisError`)
//! - The oracle and chain adapter error kinds that feed into it
//!
//! Findings are never errors: a well-formed `Unsafe` verdict is a normal
//! output. Errors inside an individual analyzer (C5-C9) are trapped by the
//! orchestrator and recorded as `AnalyzerOutcome::Errored` on that analyzer
//! alone -- they never reach this type.

use thiserror::Error;

/// Top-level error type surfaced by the engine entry point.
///
/// Encompasses every way the analysis can abort before producing an
/// `EngineResult`, providing a single error surface for callers (and for
/// the CLI wrapper's exit-code mapping, §6.4).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The artifact oracle's health probe failed.
    #[error("toolchain unavailable: {0}")]
    ToolchainUnavailable(#[from] OracleUnavailable),

    /// A missing/malformed path, malformed address, or missing required option.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// Auto-detection of the contract name inside a multi-contract artifact
    /// produced no unique answer.
    #[error("ambiguous contract: {0}")]
    ContractAmbiguous(String),

    /// The toolchain's `build` or `fetch_*` step failed; carries its
    /// diagnostic text verbatim.
    #[error("toolchain failure: {diagnostics}")]
    ToolchainFailure { diagnostics: String },

    /// Errors from the chain adapter (C2) reaching C3 abort the entire analysis.
    #[error("chain adapter error: {0}")]
    Chain(#[from] ChainError),

    /// Any unanticipated failure inside the engine.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Why the artifact oracle's health probe failed.
#[derive(Debug, Error)]
pub enum OracleUnavailable {
    #[error("toolchain binary not found on PATH: {0}")]
    BinaryNotFound(String),

    #[error("toolchain probe exited non-zero: {0}")]
    ProbeFailed(String),
}

/// Errors reading storage slots or code from the chain adapter (C2).
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to read storage slot {slot} of {address}: {reason}")]
    StorageRead {
        address: String,
        slot: String,
        reason: String,
    },

    #[error("failed to read code of {address}: {reason}")]
    CodeRead { address: String, reason: String },

    #[error("malformed RPC endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors from the artifact oracle (C1): build and artifact inspection.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The health probe (§4.8 step 1) failed to spawn or exited non-zero.
    #[error("toolchain unavailable: {0}")]
    Unavailable(#[from] OracleUnavailable),

    #[error("artifact missing for {contract} at {path}")]
    ArtifactMissing { path: String, contract: String },

    #[error("toolchain error: {0}")]
    ToolchainError(String),

    #[error("build failed: {diagnostics}")]
    BuildFailed { diagnostics: String },

    #[error("ambiguous contract in {path}: candidates {candidates:?}")]
    ContractAmbiguous { path: String, candidates: Vec<String> },
}

impl From<OracleError> for AnalysisError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Unavailable(unavailable) => AnalysisError::ToolchainUnavailable(unavailable),
            OracleError::ArtifactMissing { path, contract } => AnalysisError::ToolchainFailure {
                diagnostics: format!("artifact missing for {contract} at {path}"),
            },
            OracleError::ToolchainError(message) => AnalysisError::ToolchainFailure { diagnostics: message },
            OracleError::BuildFailed { diagnostics } => AnalysisError::ToolchainFailure { diagnostics },
            OracleError::ContractAmbiguous { path, candidates } => {
                AnalysisError::ContractAmbiguous(format!("{path}: candidates {candidates:?}"))
            }
        }
    }
}

/// An analyzer's internal failure, trapped by the orchestrator and never
/// allowed to propagate past the call site that runs that one analyzer.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analyzer panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl AnalyzerError {
    /// Builds a `Panicked` variant from a `std::panic::catch_unwind` payload.
    pub fn from_panic_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        AnalyzerError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_maps_to_toolchain_failure() {
        let err = OracleError::BuildFailed {
            diagnostics: "compile error".to_string(),
        };
        let mapped: AnalysisError = err.into();
        assert!(matches!(mapped, AnalysisError::ToolchainFailure { .. }));
    }

    #[test]
    fn probe_failure_maps_to_toolchain_unavailable() {
        let err = OracleError::Unavailable(OracleUnavailable::BinaryNotFound("forge".to_string()));
        let mapped: AnalysisError = err.into();
        assert!(matches!(mapped, AnalysisError::ToolchainUnavailable(_)));
    }

    #[test]
    fn panic_payload_with_str_message_is_captured() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = AnalyzerError::from_panic_payload(payload);
        assert!(matches!(err, AnalyzerError::Panicked(ref m) if m == "boom"));
    }

    #[test]
    fn ambiguous_contract_carries_candidates() {
        let err = OracleError::ContractAmbiguous {
            path: "src/Foo.sol".to_string(),
            candidates: vec!["Foo".to_string(), "Bar".to_string()],
        };
        let mapped: AnalysisError = err.into();
        match mapped {
            AnalysisError::ContractAmbiguous(msg) => {
                assert!(msg.contains("Foo"));
                assert!(msg.contains("Bar"));
            }
            _ => panic!("expected ContractAmbiguous"),
        }
    }
}
