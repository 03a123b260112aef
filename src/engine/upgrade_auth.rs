//! Upgrade-authorization checker (C7, §4.4)
//!
//! Runs exactly one branch, selected by `ProxyInfo.kind`: the UUPS branch
//! inspects `_authorizeUpgrade` on the new AST; the Transparent branch
//! inspects `ProxyInfo` and the new ABI. The orchestrator (C11) records
//! whichever branch did not run as `Skipped`.

use crate::types::{Abi, AnalyzerOutcome, Address, Confidence, ContractAst, Finding, Location, ProxyInfo, Severity};
use serde_json::json;
use std::collections::BTreeMap;

const AUTHORIZE_UPGRADE: &str = "_authorizeUpgrade";

/// UUPS branch (§4.4.1).
pub fn check_uups(new_ast: &ContractAst) -> AnalyzerOutcome {
    let findings = match new_ast.function(AUTHORIZE_UPGRADE) {
        None => vec![finding_uups_001()],
        Some(decl) => {
            if !decl.has_body {
                vec![finding_uups_002()]
            } else if !decl.has_access_control_signal() {
                vec![finding_uups_003(&decl.name)]
            } else {
                vec![]
            }
        }
    };
    AnalyzerOutcome::Completed { findings }
}

/// Transparent branch (§4.4.2).
pub fn check_transparent(proxy_info: &ProxyInfo, new_abi: &Abi) -> AnalyzerOutcome {
    let mut findings = Vec::new();

    if proxy_info.admin == Some(Address::ZERO) {
        findings.push(finding_tproxy_001());
    }

    if new_abi.functions.iter().any(|f| f.name == "upgradeTo" || f.name == "upgradeToAndCall") {
        findings.push(finding_tproxy_002());
    }

    for f in &new_abi.functions {
        if is_proxy_admin_signature(&f.canonical_signature()) {
            findings.push(finding_tproxy_004(&f.canonical_signature()));
        }
    }

    AnalyzerOutcome::Completed { findings }
}

fn is_proxy_admin_signature(signature: &str) -> bool {
    const PROXY_ADMIN_SIGNATURES: [&str; 5] = [
        "upgradeTo(address)",
        "upgradeToAndCall(address,bytes)",
        "changeAdmin(address)",
        "admin()",
        "implementation()",
    ];
    PROXY_ADMIN_SIGNATURES.contains(&signature)
}

fn finding_uups_001() -> Finding {
    Finding {
        code: "UUPS-001".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Missing upgrade authorization hook".to_string(),
        description: "The new implementation does not declare '_authorizeUpgrade'.".to_string(),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(AUTHORIZE_UPGRADE.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Override '_authorizeUpgrade' and guard it with an access-control check.".to_string(),
    }
}

fn finding_uups_002() -> Finding {
    Finding {
        code: "UUPS-002".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Empty upgrade authorization hook".to_string(),
        description: "'_authorizeUpgrade' has no body; any account can upgrade the proxy.".to_string(),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(AUTHORIZE_UPGRADE.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Add an access-control check to the function body.".to_string(),
    }
}

fn finding_uups_003(name: &str) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("function".to_string(), json!(name));
    Finding {
        code: "UUPS-003".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Unguarded upgrade authorization hook".to_string(),
        description: "'_authorizeUpgrade' has a non-empty body but no recognizable access-control signal."
            .to_string(),
        details,
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Guard the function with an owner/role modifier or an explicit caller check.".to_string(),
    }
}

fn finding_tproxy_001() -> Finding {
    Finding {
        code: "TPROXY-001".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Zero admin address".to_string(),
        description: "The proxy's admin slot resolves to the zero address; no account can authorize future upgrades.".to_string(),
        details: BTreeMap::new(),
        location: None,
        remediation: "Set the admin to a valid, access-controlled account (e.g. a ProxyAdmin contract).".to_string(),
    }
}

fn finding_tproxy_002() -> Finding {
    Finding {
        code: "TPROXY-002".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Upgrade function exposed on implementation".to_string(),
        description: "The new implementation declares 'upgradeTo' or 'upgradeToAndCall', which belongs on the \
                       Transparent proxy/admin, not the implementation."
            .to_string(),
        details: BTreeMap::new(),
        location: None,
        remediation: "Remove the upgrade function from the implementation; keep upgrade logic on the proxy/admin.".to_string(),
    }
}

fn finding_tproxy_004(signature: &str) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("signature".to_string(), json!(signature));
    Finding {
        code: "TPROXY-004".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Proxy-admin selector collision".to_string(),
        description: format!(
            "The new implementation declares '{signature}', which collides with a fixed Transparent-proxy \
             admin selector and will be intercepted by the proxy's admin-only dispatch."
        ),
        details,
        location: None,
        remediation: "Rename the colliding function so its selector no longer matches a proxy-admin selector.".to_string(),
    }
}
