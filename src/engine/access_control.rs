//! Access-control differ (C9, §4.6)
//!
//! Pure AST comparison of per-function access control between the old and
//! new implementation. Functions absent from the new side are out of
//! scope here -- they are covered by the interface differ (C6, §4.3).

use crate::types::{AnalyzerOutcome, Confidence, ContractAst, Finding, FunctionDecl, Location, Severity, Visibility};
use std::collections::BTreeMap;

const AUTHORIZE_UPGRADE: &str = "_authorizeUpgrade";

pub fn diff(old_ast: &ContractAst, new_ast: &ContractAst) -> AnalyzerOutcome {
    let mut findings = Vec::new();

    let old_by_name = old_ast.by_name();
    let new_by_name = new_ast.by_name();

    for (name, old_decl) in &old_by_name {
        let Some(new_decl) = new_by_name.get(name) else {
            continue;
        };

        let mut rule_fired = false;

        if old_decl.has_modifier("onlyOwner") && !new_decl.has_modifier("onlyOwner") {
            findings.push(finding_acl_001(name));
            rule_fired = true;
        }

        if old_decl.has_modifier_prefix("onlyRole") && !new_decl.has_modifier_prefix("onlyRole") {
            findings.push(finding_acl_002(name));
            rule_fired = true;
        }

        if !rule_fired && old_decl.has_access_control_signal() && !new_decl.has_access_control_signal() {
            findings.push(finding_acl_003(name));
        }

        if is_narrow(old_decl.visibility) && is_broad(new_decl.visibility) {
            findings.push(finding_acl_004(name, old_decl.visibility, new_decl.visibility));
        }

        if *name == AUTHORIZE_UPGRADE && old_decl.has_access_control_signal() && !new_decl.has_access_control_signal() {
            findings.push(finding_acl_007(name));
        }
    }

    AnalyzerOutcome::Completed { findings }
}

fn is_narrow(v: Visibility) -> bool {
    matches!(v, Visibility::Internal | Visibility::Private)
}

fn is_broad(v: Visibility) -> bool {
    matches!(v, Visibility::Public | Visibility::External)
}

fn finding_acl_001(name: &str) -> Finding {
    Finding {
        code: "ACL-001".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "onlyOwner guard removed".to_string(),
        description: format!("'{name}' was guarded by 'onlyOwner' in the old implementation; the new implementation no longer carries that modifier."),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Restore the 'onlyOwner' modifier, or document and review the intentional relaxation.".to_string(),
    }
}

fn finding_acl_002(name: &str) -> Finding {
    Finding {
        code: "ACL-002".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "onlyRole guard removed".to_string(),
        description: format!("'{name}' carried an 'onlyRole(...)' modifier in the old implementation; none remains in the new one."),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Restore a role check, or document and review the intentional relaxation.".to_string(),
    }
}

fn finding_acl_003(name: &str) -> Finding {
    Finding {
        code: "ACL-003".to_string(),
        severity: Severity::High,
        confidence: Confidence::Medium,
        title: "Access-control signal lost".to_string(),
        description: format!("'{name}' had a recognizable access-control signal in the old implementation; the new implementation has none."),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Confirm the relaxation is intentional; otherwise restore a guard.".to_string(),
    }
}

fn finding_acl_004(name: &str, old_visibility: Visibility, new_visibility: Visibility) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("old_visibility".to_string(), serde_json::json!(format!("{:?}", old_visibility)));
    details.insert("new_visibility".to_string(), serde_json::json!(format!("{:?}", new_visibility)));
    Finding {
        code: "ACL-004".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Function visibility widened".to_string(),
        description: format!("'{name}' moved from internal/private to public/external visibility, exposing it to arbitrary callers."),
        details,
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Narrow the visibility back, or add an explicit access-control guard before widening it.".to_string(),
    }
}

fn finding_acl_007(name: &str) -> Finding {
    Finding {
        code: "ACL-007".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Upgrade authorization guard removed".to_string(),
        description: "'_authorizeUpgrade' had an access-control signal in the old implementation; the new implementation has none.".to_string(),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Restore an access-control guard on '_authorizeUpgrade' before deploying this upgrade.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionKind;
    use std::collections::BTreeSet;

    fn decl(name: &str, modifiers: Vec<&str>, visibility: Visibility, references_sender: bool) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            kind: FunctionKind::Regular,
            visibility,
            modifiers: modifiers.into_iter().map(|m| m.to_string()).collect(),
            has_body: true,
            body_references_sender: references_sender,
            body_has_storage_assignment: false,
            body_calls: BTreeSet::new(),
        }
    }

    #[test]
    fn only_owner_removed_emits_acl_001() {
        let old = ContractAst {
            name: "C".to_string(),
            functions: vec![decl("adminAction", vec!["onlyOwner"], Visibility::Public, false)],
        };
        let new = ContractAst {
            name: "C".to_string(),
            functions: vec![decl("adminAction", vec![], Visibility::Public, false)],
        };
        let outcome = diff(&old, &new);
        assert_eq!(outcome.findings()[0].code, "ACL-001");
    }

    #[test]
    fn visibility_widened_emits_acl_004() {
        let old = ContractAst {
            name: "C".to_string(),
            functions: vec![decl("helper", vec![], Visibility::Internal, false)],
        };
        let new = ContractAst {
            name: "C".to_string(),
            functions: vec![decl("helper", vec![], Visibility::External, false)],
        };
        let outcome = diff(&old, &new);
        assert!(outcome.findings().iter().any(|f| f.code == "ACL-004"));
    }

    #[test]
    fn unchanged_guard_yields_no_findings() {
        let old = ContractAst {
            name: "C".to_string(),
            functions: vec![decl("adminAction", vec!["onlyOwner"], Visibility::Public, false)],
        };
        let new = ContractAst {
            name: "C".to_string(),
            functions: vec![decl("adminAction", vec!["onlyOwner"], Visibility::Public, false)],
        };
        let outcome = diff(&old, &new);
        assert!(outcome.findings().is_empty());
    }
}
