//! Configuration and CLI surface (§6.3, §6.4)
//!
//! `EngineRequest` is the core entry point's input (§6.3); `Cli` is the
//! clap-derived command-line surface the binary parses into one. Keeping
//! them distinct means the core crate never depends on `clap` types.

use crate::errors::AnalysisError;
use crate::types::Address;
use clap::Parser;
use std::str::FromStr;

/// The core entry operation's input (§6.3).
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub proxy_address: Address,
    pub project_root: String,
    pub old_implementation_path: String,
    pub new_implementation_path: String,
    pub rpc_endpoint: String,
    pub contract_name: Option<String>,
}

/// Command-line arguments for the `upgrade-safety-analyzer` binary.
#[derive(Debug, Parser)]
#[command(name = "upgrade-safety-analyzer", about = "Deterministic upgrade-safety analysis for proxy contracts")]
pub struct Cli {
    /// Deployed proxy address, as a 0x-prefixed hex string.
    #[arg(long)]
    pub proxy: String,

    /// Root of the Foundry project both implementations live under.
    #[arg(long, default_value = ".")]
    pub project_root: String,

    /// Path (relative to `project_root`) of the currently deployed implementation's source file.
    #[arg(long)]
    pub old_impl: String,

    /// Path (relative to `project_root`) of the candidate new implementation's source file.
    #[arg(long)]
    pub new_impl: String,

    /// JSON-RPC endpoint of the chain the proxy is deployed on.
    #[arg(long, env = "UPGRADE_SAFETY_RPC_URL")]
    pub rpc_endpoint: String,

    /// Explicit contract name, for source files declaring more than one contract.
    #[arg(long)]
    pub contract_name: Option<String>,

    /// Path to write the rendered Markdown report to, in addition to stdout.
    #[arg(long)]
    pub report_out: Option<String>,

    /// `forge`-compatible toolchain binary to invoke.
    #[arg(long, default_value = "forge")]
    pub forge_bin: String,
}

impl TryFrom<Cli> for EngineRequest {
    type Error = AnalysisError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let proxy_address = Address::from_str(&cli.proxy)
            .map_err(|e| AnalysisError::InputInvalid(format!("malformed proxy address '{}': {e}", cli.proxy)))?;
        Ok(EngineRequest {
            proxy_address,
            project_root: cli.project_root,
            old_implementation_path: cli.old_impl,
            new_implementation_path: cli.new_impl,
            rpc_endpoint: cli.rpc_endpoint,
            contract_name: cli.contract_name,
        })
    }
}
