//! Initializer checker (C8, §4.5)
//!
//! Pure AST check of the new implementation's initialization discipline:
//! constructors must not write storage directly, exactly one function must
//! be guarded by the bare `initializer` modifier, and constructors should
//! disable future initialization via the conventional helper.

use crate::types::{AnalyzerOutcome, Confidence, ContractAst, Finding, FunctionDecl, FunctionKind, Location, Severity};
use std::collections::BTreeMap;

const DISABLE_INITIALIZERS_CALL: &str = "_disableInitializers";

pub fn check(new_ast: &ContractAst) -> AnalyzerOutcome {
    let mut findings = Vec::new();

    let constructors: Vec<&FunctionDecl> = new_ast
        .functions
        .iter()
        .filter(|f| f.kind == FunctionKind::Constructor)
        .collect();
    let init_fns: Vec<&FunctionDecl> = new_ast
        .functions
        .iter()
        .filter(|f| f.has_modifier("initializer") || f.has_modifier("reinitializer"))
        .collect();

    for ctor in &constructors {
        if ctor.body_has_storage_assignment {
            findings.push(finding_init_001(ctor));
        }
    }

    if !constructors.is_empty() && !constructors.iter().any(|c| c.body_calls.contains(DISABLE_INITIALIZERS_CALL)) {
        findings.push(finding_init_005());
    }

    if init_fns.is_empty() {
        findings.push(finding_init_002());
    }

    let bare_initializer_count = init_fns.iter().filter(|f| f.has_modifier("initializer")).count();
    if bare_initializer_count > 1 {
        findings.push(finding_init_006(bare_initializer_count));
    }

    AnalyzerOutcome::Completed { findings }
}

fn finding_init_001(ctor: &FunctionDecl) -> Finding {
    Finding {
        code: "INIT-001".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Constructor writes storage directly".to_string(),
        description: "A constructor assigns to storage; constructor-time state is never applied to the proxy, \
                       only to the implementation's own (unused) storage."
            .to_string(),
        details: BTreeMap::new(),
        location: Some(Location {
            contract: None,
            function: Some(ctor.name.clone()),
            slot: None,
            offset: None,
        }),
        remediation: "Move state assignment into an `initializer`-guarded function called through the proxy.".to_string(),
    }
}

fn finding_init_002() -> Finding {
    Finding {
        code: "INIT-002".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "No initializer function".to_string(),
        description: "No function is guarded by the 'initializer' or 'reinitializer' modifier.".to_string(),
        details: BTreeMap::new(),
        location: None,
        remediation: "Add an `initializer`-guarded function that performs proxy-time setup.".to_string(),
    }
}

fn finding_init_005() -> Finding {
    Finding {
        code: "INIT-005".to_string(),
        severity: Severity::Medium,
        confidence: Confidence::Medium,
        title: "Constructor does not disable initializers".to_string(),
        description: format!(
            "None of the constructors call '{DISABLE_INITIALIZERS_CALL}'; the implementation contract itself \
             can still be initialized and potentially self-destructed or hijacked."
        ),
        details: BTreeMap::new(),
        location: None,
        remediation: format!("Call '{DISABLE_INITIALIZERS_CALL}()' in the implementation's constructor."),
    }
}

fn finding_init_006(count: usize) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("initializer_count".to_string(), serde_json::json!(count));
    Finding {
        code: "INIT-006".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Multiple bare initializer functions".to_string(),
        description: format!(
            "{count} functions are guarded by the bare 'initializer' modifier; only one should ever run, or \
             storage may be double-initialized across upgrades."
        ),
        details,
        location: None,
        remediation: "Keep exactly one 'initializer'-guarded function; use 'reinitializer(n)' for subsequent upgrades.".to_string(),
    }
}
