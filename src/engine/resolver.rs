//! Resolver (C4, §2, §4)
//!
//! Validates the old/new implementation source paths, drives the artifact
//! oracle (C1) for both sides, and produces the immutable [`Resolved`]
//! bundle the fan-out stage (C5-C9) borrows from. Runs strictly after C3
//! and strictly before the fan-out (§5, "Ordering guarantees").

use crate::errors::AnalysisError;
use crate::oracle::{ArtifactKey, ArtifactOracle};
use crate::types::{ContractAst, Resolved, Side};
use std::path::Path;

/// One side's raw input: a source path plus an optional contract-name override.
pub struct SideRequest<'a> {
    pub project_root: &'a str,
    pub source_path: &'a str,
    pub contract_name_override: Option<&'a str>,
}

/// Resolves both implementation sides via the oracle, in sequence (old
/// then new -- order has no observable effect since neither resolution
/// depends on the other, but a fixed order keeps tracing output stable).
pub async fn resolve(
    oracle: &dyn ArtifactOracle,
    old: SideRequest<'_>,
    new: SideRequest<'_>,
) -> Result<Resolved, AnalysisError> {
    oracle.build(old.project_root).await?;
    if new.project_root != old.project_root {
        oracle.build(new.project_root).await?;
    }

    let old_side = resolve_side(oracle, old).await?;
    let new_side = resolve_side(oracle, new).await?;
    Ok(Resolved {
        old: old_side,
        new: new_side,
    })
}

async fn resolve_side(oracle: &dyn ArtifactOracle, request: SideRequest<'_>) -> Result<Side, AnalysisError> {
    validate_path(request.source_path)?;
    let contract_name = match request.contract_name_override {
        Some(name) => name.to_string(),
        None => infer_contract_name(request.source_path)?,
    };
    let key = ArtifactKey {
        project_root: request.project_root.to_string(),
        source_path: request.source_path.to_string(),
        contract_name: contract_name.clone(),
    };

    let layout = oracle.fetch_storage_layout(&key).await?;
    let abi = oracle.fetch_abi(&key).await?;
    let ast: ContractAst = oracle.fetch_ast(&key).await?;

    Ok(Side {
        path: request.source_path.to_string(),
        contract_name,
        layout,
        abi,
        ast,
    })
}

fn validate_path(source_path: &str) -> Result<(), AnalysisError> {
    if source_path.trim().is_empty() {
        return Err(AnalysisError::InputInvalid("source path must not be empty".to_string()));
    }
    if !source_path.ends_with(".sol") {
        return Err(AnalysisError::InputInvalid(format!(
            "source path '{source_path}' is not a .sol file"
        )));
    }
    Ok(())
}

/// Infers the contract name from the file stem, matching Solidity's
/// one-contract-per-file convention. A caller with a multi-contract file
/// should pass `options.contract_name` instead (§6.3) -- this path never
/// consults the artifact's contract list, so an ambiguous multi-contract
/// file surfaces as a build/artifact error downstream rather than here.
fn infer_contract_name(source_path: &str) -> Result<String, AnalysisError> {
    Path::new(source_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AnalysisError::InputInvalid(format!("cannot infer contract name from '{source_path}'")))
}
