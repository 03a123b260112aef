//! Core data model for upgrade-safety analysis
//!
//! This module defines the fingerprint types, storage/ABI/AST projections,
//! and the result types shared by every analyzer:
//! - Fingerprint types (`Address`, `SlotKey`, `Selector`, `TopicHash`)
//! - Proxy classification output (`ProxyInfo`)
//! - Storage layout and interface projections (`StorageLayout`, `Abi`)
//! - AST projections consumed by the access-control and initializer checks
//! - The per-analyzer outcome and the aggregated engine result

/// Re-exports from alloy for user convenience
pub use alloy::primitives::Address;

use alloy::primitives::{keccak256, B256};
use serde::Serialize;
use std::collections::BTreeMap;

/// 32-byte storage slot key.
pub type SlotKey = B256;

/// 4-byte function selector, derived from `keccak256(name(inputs))[..4]`.
pub type Selector = [u8; 4];

/// 32-byte event topic0, derived from `keccak256(name(inputs))`.
pub type TopicHash = B256;

/// Computes the 4-byte selector for a canonical function signature.
pub fn selector_of(canonical_signature: &str) -> Selector {
    let hash = keccak256(canonical_signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Computes the 32-byte topic0 for a canonical event signature.
pub fn topic0_of(canonical_signature: &str) -> TopicHash {
    keccak256(canonical_signature.as_bytes())
}

/// The two proxy patterns this engine can classify and analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProxyKind {
    Transparent,
    Uups,
}

/// Outcome of proxy classification (C3). Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyInfo {
    pub kind: ProxyKind,
    pub proxy: Address,
    pub implementation: Address,
    /// Populated only for `ProxyKind::Transparent`.
    pub admin: Option<Address>,
}

/// State-variable mutability, carried through from the ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

/// A single storage slot assignment, in canonical (post storage-layout-oracle) form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageEntry {
    pub slot: u64,
    pub offset: u8,
    pub length_bytes: u8,
    pub canonical_type: String,
    pub label: String,
    pub origin: String,
    pub declaration_index: u32,
}

impl StorageEntry {
    /// The `(slot, offset)` primary key used for layout comparison.
    pub fn key(&self) -> (u64, u8) {
        (self.slot, self.offset)
    }

    /// True if this entry is a storage gap: `uint256[N]`-typed and labeled
    /// with the conventional `gap` suffix (case-insensitive).
    pub fn is_gap(&self) -> bool {
        self.label.to_ascii_lowercase().ends_with("gap") && gap_array_len(&self.canonical_type).is_some()
    }

    /// The declared array length if `canonical_type` is `uint256[N]`.
    pub fn gap_len(&self) -> Option<u64> {
        gap_array_len(&self.canonical_type)
    }
}

fn gap_array_len(canonical_type: &str) -> Option<u64> {
    let rest = canonical_type.strip_prefix("uint256[")?;
    let digits = rest.strip_suffix(']')?;
    digits.parse::<u64>().ok()
}

/// Ordered sequence of storage entries, ancestors-first (inheritance-linearized).
///
/// Invariants (violating inputs are rejected by the resolver, not silently
/// tolerated by the differ): no two entries share `(slot, offset)`;
/// `offset + length_bytes <= 32`; `declaration_index` strictly increases.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageLayout {
    pub entries: Vec<StorageEntry>,
}

impl StorageLayout {
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        let mut last_index: Option<u32> = None;
        for entry in &self.entries {
            if !seen.insert(entry.key()) {
                return Err(format!(
                    "duplicate storage key (slot={}, offset={})",
                    entry.slot, entry.offset
                ));
            }
            if entry.offset as u32 + entry.length_bytes as u32 > 32 {
                return Err(format!(
                    "entry '{}' overflows its slot: offset {} + length {} > 32",
                    entry.label, entry.offset, entry.length_bytes
                ));
            }
            if let Some(prev) = last_index {
                if entry.declaration_index <= prev {
                    return Err("declaration_index must strictly increase".to_string());
                }
            }
            last_index = Some(entry.declaration_index);
        }
        Ok(())
    }

    pub fn non_gap_entries(&self) -> impl Iterator<Item = &StorageEntry> {
        self.entries.iter().filter(|e| !e.is_gap())
    }

    pub fn gap_entries(&self) -> impl Iterator<Item = &StorageEntry> {
        self.entries.iter().filter(|e| e.is_gap())
    }
}

/// A single function signature, as it appears in an ABI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSig {
    pub selector: Selector,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub mutability: Mutability,
}

impl FunctionSig {
    /// The canonical signature `name(type1,type2,...)` used to derive `selector`.
    pub fn canonical_signature(&self) -> String {
        format!("{}({})", self.name, self.inputs.join(","))
    }
}

/// A single event signature, as it appears in an ABI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSig {
    pub topic0: TopicHash,
    pub name: String,
    pub inputs: Vec<(String, bool)>,
}

impl EventSig {
    pub fn canonical_signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|(t, _)| t.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

/// The full external interface of a contract.
///
/// Invariant: no two entries in `functions` share a selector. A violation
/// of this invariant is itself surfaced as a finding (`ABI-002`), not an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Abi {
    pub functions: Vec<FunctionSig>,
    pub events: Vec<EventSig>,
}

/// Function kind, as tagged by the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionKind {
    Regular,
    Constructor,
    Fallback,
    Receive,
}

/// Function visibility, as tagged by the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

/// A function declaration projected from the AST, extracted once into a
/// strongly-typed value rather than re-walked as a raw tree node.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub modifiers: Vec<String>,
    pub has_body: bool,
    pub body_references_sender: bool,
    pub body_has_storage_assignment: bool,
    pub body_calls: std::collections::BTreeSet<String>,
}

impl FunctionDecl {
    /// The access-control signal shared by C7 (`_authorizeUpgrade`) and C9:
    /// a modifier whose lowercased name contains a well-known access-control
    /// keyword, or a body that inspects the caller identity.
    pub fn has_access_control_signal(&self) -> bool {
        const KEYWORDS: [&str; 7] = ["only", "auth", "authorized", "owner", "admin", "role", "guard"];
        let modifier_hit = self
            .modifiers
            .iter()
            .any(|m| KEYWORDS.iter().any(|kw| m.to_ascii_lowercase().contains(kw)));
        modifier_hit || self.body_references_sender
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m == name)
    }

    pub fn has_modifier_prefix(&self, prefix: &str) -> bool {
        self.modifiers.iter().any(|m| m.starts_with(prefix))
    }
}

/// A contract's AST projection: every function declared directly on it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContractAst {
    pub name: String,
    pub functions: Vec<FunctionDecl>,
}

impl ContractAst {
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn by_name(&self) -> BTreeMap<&str, &FunctionDecl> {
        self.functions.iter().map(|f| (f.name.as_str(), f)).collect()
    }
}

/// One side (old or new) of a resolved implementation.
#[derive(Debug, Clone)]
pub struct Side {
    pub path: String,
    pub contract_name: String,
    pub layout: StorageLayout,
    pub abi: Abi,
    pub ast: ContractAst,
}

/// The normalized bundle produced by the resolver (C4). Immutable thereafter.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub old: Side,
    pub new: Side,
}

/// Finding severity, ordered `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Confidence of a finding, independent of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    Medium,
    High,
}

/// Where a finding is anchored, for stable sorting and report rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Location {
    pub contract: Option<String>,
    pub function: Option<String>,
    pub slot: Option<u64>,
    pub offset: Option<u8>,
}

/// One machine-emitted conclusion about a specific upgrade-safety risk.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub code: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub title: String,
    pub description: String,
    pub details: BTreeMap<String, serde_json::Value>,
    pub location: Option<Location>,
    pub remediation: String,
}

/// The name of one of the seven analyzers tracked by the aggregator.
pub type AnalyzerName = &'static str;

pub const ANALYZER_PROXY_DETECTION: AnalyzerName = "proxy-detection";
pub const ANALYZER_STORAGE_LAYOUT: AnalyzerName = "storage-layout";
pub const ANALYZER_ABI_DIFF: AnalyzerName = "abi-diff";
pub const ANALYZER_UUPS_SAFETY: AnalyzerName = "uups-safety";
pub const ANALYZER_TRANSPARENT_SAFETY: AnalyzerName = "transparent-safety";
pub const ANALYZER_INITIALIZER_INTEGRITY: AnalyzerName = "initializer-integrity";
pub const ANALYZER_ACCESS_CONTROL_REGRESSION: AnalyzerName = "access-control-regression";

/// All seven analyzer names, in the fixed order used for deterministic
/// finding-list sorting (§5, "Ordering guarantees").
pub const ALL_ANALYZERS: [AnalyzerName; 7] = [
    ANALYZER_PROXY_DETECTION,
    ANALYZER_STORAGE_LAYOUT,
    ANALYZER_ABI_DIFF,
    ANALYZER_UUPS_SAFETY,
    ANALYZER_TRANSPARENT_SAFETY,
    ANALYZER_INITIALIZER_INTEGRITY,
    ANALYZER_ACCESS_CONTROL_REGRESSION,
];

/// The three-way outcome split that is load-bearing for verdict computation.
///
/// `Skipped` means the analyzer intentionally did not apply (wrong proxy
/// kind, upstream gate tripped); `Errored` means it tried and failed. The
/// two are never conflated: a verdict can only become `Safe` if every
/// analyzer `Completed`.
#[derive(Debug, Clone, Serialize)]
pub enum AnalyzerOutcome {
    Completed { findings: Vec<Finding> },
    Skipped { reason: String },
    Errored { message: String },
}

impl AnalyzerOutcome {
    pub fn status(&self) -> AnalyzerStatus {
        match self {
            AnalyzerOutcome::Completed { .. } => AnalyzerStatus::Completed,
            AnalyzerOutcome::Skipped { .. } => AnalyzerStatus::Skipped,
            AnalyzerOutcome::Errored { .. } => AnalyzerStatus::Errored,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            AnalyzerOutcome::Completed { findings } => findings,
            _ => &[],
        }
    }
}

/// The per-analyzer status surfaced in `EngineResult::analyzer_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerStatus {
    Completed,
    Skipped,
    Errored,
}

/// The aggregate judgement produced by the aggregator (C10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Safe,
    Unsafe,
    ReviewRequired,
    Incomplete,
}

/// The final result of one `analyze()` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    pub verdict: Verdict,
    pub highest_severity: Option<Severity>,
    pub findings: Vec<Finding>,
    pub analyzer_status: BTreeMap<AnalyzerName, AnalyzerStatus>,
    pub report_markdown: String,
}
