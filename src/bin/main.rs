//! CLI wrapper: argument parsing, toolchain wiring, exit-code mapping (§6.4).
//!
//! The only place in the crate that calls `std::process::exit`. The core
//! (`upgrade_safety_analyzer::engine::analyze`) never inspects the process
//! exit code itself.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use upgrade_safety_analyzer::chain::rpc::RpcChainAdapter;
use upgrade_safety_analyzer::config::{Cli, EngineRequest};
use upgrade_safety_analyzer::engine::analyze;
use upgrade_safety_analyzer::oracle::foundry::FoundryOracle;
use upgrade_safety_analyzer::types::Verdict;
use upgrade_safety_analyzer::AnalysisError;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let report_out = cli.report_out.clone();
    let forge_bin = cli.forge_bin.clone();

    let request = match EngineRequest::try_from(cli) {
        Ok(request) => request,
        Err(err) => return report_error(&err),
    };

    let oracle = FoundryOracle::new(forge_bin);
    let chain = match RpcChainAdapter::connect(&request.rpc_endpoint).await {
        Ok(chain) => chain,
        Err(err) => return report_error(&AnalysisError::Chain(err)),
    };

    let result = match analyze(&oracle, &chain, &request).await {
        Ok(result) => result,
        Err(err) => return report_error(&err),
    };

    println!("{}", result.report_markdown);
    if let Some(path) = report_out {
        if let Err(err) = std::fs::write(&path, &result.report_markdown) {
            tracing::warn!(path, %err, "failed to write report file");
        }
    }

    exit_code_for(&result.verdict, result.highest_severity)
}

fn report_error(err: &AnalysisError) -> ExitCode {
    let (kind, exit_code) = match err {
        AnalysisError::InputInvalid(_) | AnalysisError::ContractAmbiguous(_) => ("input_invalid", 10u8),
        _ => ("runtime_error", 12u8),
    };
    eprintln!("{{\"error\": \"{kind}\", \"message\": \"{err}\"}}");
    ExitCode::from(exit_code)
}

fn exit_code_for(verdict: &Verdict, highest_severity: Option<upgrade_safety_analyzer::types::Severity>) -> ExitCode {
    use upgrade_safety_analyzer::types::Severity;
    let code = match verdict {
        Verdict::Safe => 0,
        Verdict::Unsafe => match highest_severity {
            Some(Severity::Critical) => 1,
            _ => 2,
        },
        Verdict::ReviewRequired => 3,
        Verdict::Incomplete => 4,
    };
    ExitCode::from(code)
}
