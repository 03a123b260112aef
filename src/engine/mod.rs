//! Engine orchestrator (C11, §4.8)
//!
//! Sequences proxy classification, resolution, and the five-way analyzer
//! fan-out, then hands everything to the aggregator. This is the crate's
//! single public entry point (§6.3).

pub mod abi_diff;
pub mod access_control;
pub mod aggregator;
pub mod initializer;
pub mod proxy;
pub mod resolver;
pub mod storage_diff;
pub mod upgrade_auth;

use crate::chain::ChainAdapter;
use crate::config::EngineRequest;
use crate::errors::{AnalysisError, AnalyzerError};
use crate::oracle::ArtifactOracle;
use crate::report;
use crate::types::{
    AnalyzerOutcome, AnalyzerName, EngineResult, ProxyKind, Resolved, ANALYZER_ABI_DIFF,
    ANALYZER_ACCESS_CONTROL_REGRESSION, ANALYZER_INITIALIZER_INTEGRITY, ANALYZER_PROXY_DETECTION,
    ANALYZER_STORAGE_LAYOUT, ANALYZER_TRANSPARENT_SAFETY, ANALYZER_UUPS_SAFETY,
};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use tracing::{info, info_span, warn, Instrument};

/// Runs one end-to-end analysis (§6.3's core entry operation).
pub async fn analyze(
    oracle: &dyn ArtifactOracle,
    chain: &dyn ChainAdapter,
    request: &EngineRequest,
) -> Result<EngineResult, AnalysisError> {
    let span = info_span!("analyze", proxy = %request.proxy_address);
    async move {
        oracle.probe().await?;

        let mut outcomes: BTreeMap<AnalyzerName, AnalyzerOutcome> = BTreeMap::new();

        let (proxy_info, proxy_outcome) = proxy::classify(chain, request.proxy_address)
            .instrument(info_span!("classify_proxy"))
            .await?;
        let proxy_blocks = proxy::is_blocking(&proxy_outcome);
        outcomes.insert(ANALYZER_PROXY_DETECTION, proxy_outcome);

        if proxy_blocks {
            warn!("proxy classification produced a blocking finding; skipping all other analyzers");
            for name in [
                ANALYZER_STORAGE_LAYOUT,
                ANALYZER_ABI_DIFF,
                ANALYZER_UUPS_SAFETY,
                ANALYZER_TRANSPARENT_SAFETY,
                ANALYZER_INITIALIZER_INTEGRITY,
                ANALYZER_ACCESS_CONTROL_REGRESSION,
            ] {
                outcomes.insert(name, AnalyzerOutcome::Skipped { reason: "proxy-detection-failed".to_string() });
            }
            return finish(outcomes);
        }

        let proxy_info = proxy_info.expect("non-blocking proxy outcome always carries a ProxyInfo");
        info!(kind = ?proxy_info.kind, "proxy classified");

        let resolved = resolver::resolve(
            oracle,
            resolver::SideRequest {
                project_root: &request.project_root,
                source_path: &request.old_implementation_path,
                contract_name_override: request.contract_name.as_deref(),
            },
            resolver::SideRequest {
                project_root: &request.project_root,
                source_path: &request.new_implementation_path,
                contract_name_override: request.contract_name.as_deref(),
            },
        )
        .instrument(info_span!("resolve_implementations"))
        .await?;

        run_fan_out(&mut outcomes, &resolved, &proxy_info);

        finish(outcomes)
    }
    .instrument(span)
    .await
}

fn run_fan_out(outcomes: &mut BTreeMap<AnalyzerName, AnalyzerOutcome>, resolved: &Resolved, proxy_info: &crate::types::ProxyInfo) {
    let _span = info_span!("run_analyzers").entered();

    outcomes.insert(
        ANALYZER_STORAGE_LAYOUT,
        trap(ANALYZER_STORAGE_LAYOUT, || storage_diff::diff(&resolved.old.layout, &resolved.new.layout)),
    );
    outcomes.insert(
        ANALYZER_ABI_DIFF,
        trap(ANALYZER_ABI_DIFF, || abi_diff::diff(&resolved.old.abi, &resolved.new.abi)),
    );

    match proxy_info.kind {
        ProxyKind::Uups => {
            outcomes.insert(
                ANALYZER_UUPS_SAFETY,
                trap(ANALYZER_UUPS_SAFETY, || upgrade_auth::check_uups(&resolved.new.ast)),
            );
            outcomes.insert(
                ANALYZER_TRANSPARENT_SAFETY,
                AnalyzerOutcome::Skipped { reason: "proxy-type-is-uups".to_string() },
            );
        }
        ProxyKind::Transparent => {
            outcomes.insert(
                ANALYZER_UUPS_SAFETY,
                AnalyzerOutcome::Skipped { reason: "proxy-type-is-transparent".to_string() },
            );
            outcomes.insert(
                ANALYZER_TRANSPARENT_SAFETY,
                trap(ANALYZER_TRANSPARENT_SAFETY, || upgrade_auth::check_transparent(proxy_info, &resolved.new.abi)),
            );
        }
    }

    outcomes.insert(
        ANALYZER_INITIALIZER_INTEGRITY,
        trap(ANALYZER_INITIALIZER_INTEGRITY, || initializer::check(&resolved.new.ast)),
    );
    outcomes.insert(
        ANALYZER_ACCESS_CONTROL_REGRESSION,
        trap(ANALYZER_ACCESS_CONTROL_REGRESSION, || access_control::diff(&resolved.old.ast, &resolved.new.ast)),
    );
}

fn trap<F>(analyzer: AnalyzerName, f: F) -> AnalyzerOutcome
where
    F: FnOnce() -> AnalyzerOutcome,
{
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => {
            tracing::debug!(analyzer, findings = outcome.findings().len(), "analyzer completed");
            outcome
        }
        Err(payload) => {
            let err = AnalyzerError::from_panic_payload(payload);
            tracing::error!(analyzer, %err, "analyzer panicked");
            AnalyzerOutcome::Errored { message: err.to_string() }
        }
    }
}

fn finish(outcomes: BTreeMap<AnalyzerName, AnalyzerOutcome>) -> Result<EngineResult, AnalysisError> {
    let _span = info_span!("aggregate").entered();
    let mut result = aggregator::aggregate(&outcomes);
    info!(verdict = ?result.verdict, findings = result.findings.len(), "analysis complete");
    result.report_markdown = report::render(&result);
    Ok(result)
}
