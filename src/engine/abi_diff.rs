//! Interface differ (C6, §4.3)
//!
//! Pure, synchronous comparison of two ABIs by selector/topic0 identity.

use crate::types::{Abi, AnalyzerOutcome, Confidence, Finding, FunctionSig, Location, Severity};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn diff(old_abi: &Abi, new_abi: &Abi) -> AnalyzerOutcome {
    let mut findings = Vec::new();

    let new_by_selector: HashMap<_, &FunctionSig> = new_abi.functions.iter().map(|f| (f.selector, f)).collect();
    let old_selectors: HashSet<_> = old_abi.functions.iter().map(|f| f.selector).collect();

    for f_old in &old_abi.functions {
        match new_by_selector.get(&f_old.selector) {
            None => {
                if let Some(f_new) = new_abi.functions.iter().find(|f| f.name == f_old.name) {
                    findings.push(finding_abi_003(f_old, f_new));
                } else {
                    findings.push(finding_abi_001(f_old));
                }
            }
            Some(f_new) => {
                if f_new.outputs != f_old.outputs {
                    findings.push(finding_abi_004(f_old, f_new));
                }
            }
        }
    }

    let mut seen_new_selectors = HashSet::new();
    for f_new in &new_abi.functions {
        if !seen_new_selectors.insert(f_new.selector) {
            findings.push(finding_abi_002(f_new));
        }
    }

    for f_new in &new_abi.functions {
        if !old_selectors.contains(&f_new.selector) {
            findings.push(finding_abi_005(f_new));
        }
    }

    let new_events_by_topic0: HashMap<_, _> = new_abi.events.iter().map(|e| (e.topic0, e)).collect();
    for e_old in &old_abi.events {
        if new_events_by_topic0.contains_key(&e_old.topic0) {
            continue;
        }
        if new_abi.events.iter().any(|e| e.name == e_old.name) {
            findings.push(finding_abi_006(&e_old.name));
        } else {
            findings.push(finding_abi_007(&e_old.name));
        }
    }

    AnalyzerOutcome::Completed { findings }
}

fn finding_abi_001(f_old: &FunctionSig) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("selector".to_string(), json!(alloy::hex::encode(f_old.selector)));
    Finding {
        code: "ABI-001".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Function selector removed".to_string(),
        description: format!("'{}' (selector 0x{}) no longer exists in the new interface.", f_old.canonical_signature(), alloy::hex::encode(f_old.selector)),
        details,
        location: Some(Location {
            contract: None,
            function: Some(f_old.name.clone()),
            slot: None,
            offset: None,
        }),
        remediation: "Restore the function or document the breaking interface change to callers.".to_string(),
    }
}

fn finding_abi_002(f_new: &FunctionSig) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("selector".to_string(), json!(alloy::hex::encode(f_new.selector)));
    Finding {
        code: "ABI-002".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Selector collision".to_string(),
        description: format!("Selector 0x{} is shared by more than one function in the new interface.", alloy::hex::encode(f_new.selector)),
        details,
        location: Some(Location {
            contract: None,
            function: Some(f_new.name.clone()),
            slot: None,
            offset: None,
        }),
        remediation: "Rename one of the colliding functions so their selectors differ.".to_string(),
    }
}

fn finding_abi_003(f_old: &FunctionSig, f_new: &FunctionSig) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("old_signature".to_string(), json!(f_old.canonical_signature()));
    details.insert("new_signature".to_string(), json!(f_new.canonical_signature()));
    Finding {
        code: "ABI-003".to_string(),
        severity: Severity::High,
        confidence: Confidence::Medium,
        title: "Function signature changed".to_string(),
        description: format!(
            "'{}' changed signature to '{}'; callers encoding the old signature will revert.",
            f_old.canonical_signature(),
            f_new.canonical_signature()
        ),
        details,
        location: Some(Location {
            contract: None,
            function: Some(f_old.name.clone()),
            slot: None,
            offset: None,
        }),
        remediation: "Keep the original parameter types or provide a migration path for callers.".to_string(),
    }
}

fn finding_abi_004(f_old: &FunctionSig, f_new: &FunctionSig) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("old_outputs".to_string(), json!(f_old.outputs));
    details.insert("new_outputs".to_string(), json!(f_new.outputs));
    Finding {
        code: "ABI-004".to_string(),
        severity: Severity::Medium,
        confidence: Confidence::High,
        title: "Return type changed".to_string(),
        description: format!("'{}' changed its return types.", f_old.canonical_signature()),
        details,
        location: Some(Location {
            contract: None,
            function: Some(f_old.name.clone()),
            slot: None,
            offset: None,
        }),
        remediation: "Confirm existing integrations decode the new return shape correctly.".to_string(),
    }
}

fn finding_abi_005(f_new: &FunctionSig) -> Finding {
    Finding {
        code: "ABI-005".to_string(),
        severity: Severity::Low,
        confidence: Confidence::High,
        title: "New function added".to_string(),
        description: format!("'{}' is new in this implementation.", f_new.canonical_signature()),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(f_new.name.clone()),
            slot: None,
            offset: None,
        }),
        remediation: "No action required; informational.".to_string(),
    }
}

fn finding_abi_006(name: &str) -> Finding {
    Finding {
        code: "ABI-006".to_string(),
        severity: Severity::High,
        confidence: Confidence::Medium,
        title: "Event signature changed".to_string(),
        description: format!("Event '{name}' changed signature; off-chain indexers keyed on the old topic0 will stop matching."),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Keep the original event parameter types, or coordinate an indexer migration.".to_string(),
    }
}

fn finding_abi_007(name: &str) -> Finding {
    Finding {
        code: "ABI-007".to_string(),
        severity: Severity::Medium,
        confidence: Confidence::High,
        title: "Event removed".to_string(),
        description: format!("Event '{name}' no longer exists in the new interface."),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(name.to_string()),
            slot: None,
            offset: None,
        }),
        remediation: "Restore the event if off-chain consumers still depend on it.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{selector_of, topic0_of, EventSig, Mutability};

    fn func(name: &str, inputs: &[&str], outputs: &[&str]) -> FunctionSig {
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let sig = format!("{}({})", name, inputs.join(","));
        FunctionSig {
            selector: selector_of(&sig),
            name: name.to_string(),
            inputs,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            mutability: Mutability::Nonpayable,
        }
    }

    fn event(name: &str, inputs: &[(&str, bool)]) -> EventSig {
        let types: Vec<String> = inputs.iter().map(|(t, _)| t.to_string()).collect();
        let sig = format!("{}({})", name, types.join(","));
        EventSig {
            topic0: topic0_of(&sig),
            name: name.to_string(),
            inputs: inputs.iter().map(|(t, i)| (t.to_string(), *i)).collect(),
        }
    }

    #[test]
    fn selector_removed_without_rename_emits_abi_001() {
        let old = Abi {
            functions: vec![func("balanceOf", &["address"], &["uint256"])],
            events: vec![],
        };
        let new = Abi {
            functions: vec![],
            events: vec![],
        };
        let outcome = diff(&old, &new);
        assert_eq!(outcome.findings()[0].code, "ABI-001");
    }

    #[test]
    fn same_name_different_signature_emits_abi_003_not_001() {
        let old = Abi {
            functions: vec![func("transfer", &["address", "uint256"], &["bool"])],
            events: vec![],
        };
        let new = Abi {
            functions: vec![func("transfer", &["address", "uint256", "bytes"], &["bool"])],
            events: vec![],
        };
        let outcome = diff(&old, &new);
        let codes: Vec<&str> = outcome.findings().iter().map(|f| f.code.as_str()).collect();
        assert!(codes.contains(&"ABI-003"));
        assert!(!codes.contains(&"ABI-001"));
    }

    #[test]
    fn duplicate_selector_in_new_emits_abi_002() {
        let a = func("foo", &[], &[]);
        let mut b = func("bar", &[], &[]);
        b.selector = a.selector;
        let new = Abi {
            functions: vec![a, b],
            events: vec![],
        };
        let old = Abi {
            functions: vec![],
            events: vec![],
        };
        let outcome = diff(&old, &new);
        assert!(outcome.findings().iter().any(|f| f.code == "ABI-002"));
    }

    #[test]
    fn event_removed_emits_abi_007() {
        let old = Abi {
            functions: vec![],
            events: vec![event("Transfer", &[("address", true), ("address", true), ("uint256", false)])],
        };
        let new = Abi {
            functions: vec![],
            events: vec![],
        };
        let outcome = diff(&old, &new);
        assert_eq!(outcome.findings()[0].code, "ABI-007");
    }
}
