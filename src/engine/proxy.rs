//! Proxy classifier (C3, §4.1)
//!
//! Reads three well-known storage slots and the code at the proxy and
//! implementation addresses, then classifies the deployment as
//! Transparent or UUPS -- or emits a blocking finding and produces no
//! [`ProxyInfo`] at all. This is the only analyzer whose outcome can veto
//! the rest of the pipeline (§4.1, §5, §8 property 5).

use crate::chain::ChainAdapter;
use crate::errors::ChainError;
use crate::types::{
    Address, AnalyzerOutcome, Confidence, Finding, Location, ProxyInfo, ProxyKind, Severity, SlotKey,
};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// EIP-1967 implementation slot: `keccak256("eip1967.proxy.implementation") - 1`.
pub static IMPL_SLOT: Lazy<SlotKey> = Lazy::new(|| {
    slot_from_hex("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc")
});

/// EIP-1967 admin slot: `keccak256("eip1967.proxy.admin") - 1`.
pub static ADMIN_SLOT: Lazy<SlotKey> = Lazy::new(|| {
    slot_from_hex("0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103")
});

/// EIP-1967 beacon slot: `keccak256("eip1967.proxy.beacon") - 1`.
pub static BEACON_SLOT: Lazy<SlotKey> = Lazy::new(|| {
    slot_from_hex("0xa3f0ad74e5423aebfd80d3ef4346578335a9a72aeaee59ff6cb3582b35133d50")
});

/// 4-byte selector of the UUPS identity function `proxiableUUID()`.
pub const PROXIABLE_UUID_SELECTOR: [u8; 4] = [0x52, 0xd1, 0x90, 0x2d];

fn slot_from_hex(hex: &str) -> SlotKey {
    let trimmed = hex.trim_start_matches("0x");
    let bytes = hex_decode(trimmed);
    SlotKey::from_slice(&bytes)
}

fn hex_decode(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0))
        .collect()
}

/// Extracts the right-most 20 bytes of a 32-byte slot value as an address.
fn address_from_slot(slot: &SlotKey) -> Address {
    Address::from_slice(&slot.0[12..32])
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Classifies the proxy pattern at `proxy`, following §4.1's procedure.
///
/// Returns the classified `ProxyInfo` alongside the `proxy-detection`
/// outcome, or `None` alongside a `Completed` outcome carrying one of the
/// blocking `PROXY-00{1,2,3,5}` findings.
pub async fn classify(
    chain: &dyn ChainAdapter,
    proxy: Address,
) -> Result<(Option<ProxyInfo>, AnalyzerOutcome), ChainError> {
    let impl_slot_value = chain.read_storage_slot(proxy, *IMPL_SLOT).await?;
    let admin_slot_value = chain.read_storage_slot(proxy, *ADMIN_SLOT).await?;
    let beacon_slot_value = chain.read_storage_slot(proxy, *BEACON_SLOT).await?;
    let proxy_code = chain.read_code(proxy).await?;

    let implementation = address_from_slot(&impl_slot_value);
    let admin = address_from_slot(&admin_slot_value);
    let beacon = address_from_slot(&beacon_slot_value);

    if beacon != Address::ZERO {
        return Ok((None, blocking_outcome(finding_proxy_001())));
    }
    if implementation == Address::ZERO {
        return Ok((None, blocking_outcome(finding_proxy_002())));
    }

    let impl_code = chain.read_code(implementation).await?;
    if impl_code.is_empty() {
        return Ok((None, blocking_outcome(finding_proxy_003())));
    }

    if contains_subslice(&impl_code, &PROXIABLE_UUID_SELECTOR) {
        let info = ProxyInfo {
            kind: ProxyKind::Uups,
            proxy,
            implementation,
            admin: None,
        };
        return Ok((Some(info), AnalyzerOutcome::Completed { findings: vec![] }));
    }

    if admin != Address::ZERO {
        let info = ProxyInfo {
            kind: ProxyKind::Transparent,
            proxy,
            implementation,
            admin: Some(admin),
        };
        return Ok((Some(info), AnalyzerOutcome::Completed { findings: vec![] }));
    }

    // Ambiguous: admin slot reads zero and the UUPS selector is absent.
    // §9 "Proxy classification fallback": inspect the proxy's own bytecode
    // for the admin-slot hash, so a zero-admin transparent proxy still
    // reaches the Transparent analyzer (and surfaces TPROXY-001) instead of
    // dying here as Incomplete.
    if contains_subslice(&proxy_code, ADMIN_SLOT.as_slice()) {
        let info = ProxyInfo {
            kind: ProxyKind::Transparent,
            proxy,
            implementation,
            admin: Some(admin),
        };
        return Ok((Some(info), AnalyzerOutcome::Completed { findings: vec![] }));
    }

    Ok((None, blocking_outcome(finding_proxy_005())))
}

fn blocking_outcome(finding: Finding) -> AnalyzerOutcome {
    AnalyzerOutcome::Completed {
        findings: vec![finding],
    }
}

/// The blocking codes that veto every downstream analyzer (§4.1, §8 property 5).
pub const BLOCKING_CODES: [&str; 4] = ["PROXY-001", "PROXY-002", "PROXY-003", "PROXY-005"];

pub fn is_blocking(outcome: &AnalyzerOutcome) -> bool {
    outcome
        .findings()
        .iter()
        .any(|f| BLOCKING_CODES.contains(&f.code.as_str()))
}

fn finding_proxy_001() -> Finding {
    Finding {
        code: "PROXY-001".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Beacon proxy pattern unsupported".to_string(),
        description: "The proxy's beacon slot is non-zero; beacon-pattern proxies are not one of the two \
                       supported patterns (Transparent, UUPS)."
            .to_string(),
        details: BTreeMap::new(),
        location: Some(Location::default()),
        remediation: "Re-run analysis against a Transparent or UUPS proxy, or add beacon support upstream."
            .to_string(),
    }
}

fn finding_proxy_002() -> Finding {
    Finding {
        code: "PROXY-002".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "No implementation address found".to_string(),
        description: "The EIP-1967 implementation slot is zero.".to_string(),
        details: BTreeMap::new(),
        location: Some(Location::default()),
        remediation: "Verify the proxy address and that it has been initialized with an implementation."
            .to_string(),
    }
}

fn finding_proxy_003() -> Finding {
    Finding {
        code: "PROXY-003".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Implementation address has no code".to_string(),
        description: "The address referenced by the implementation slot has no deployed bytecode.".to_string(),
        details: BTreeMap::new(),
        location: Some(Location::default()),
        remediation: "Verify the implementation address is correct and deployed on this chain.".to_string(),
    }
}

fn finding_proxy_005() -> Finding {
    Finding {
        code: "PROXY-005".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::Medium,
        title: "Unable to classify proxy pattern".to_string(),
        description: "Neither the UUPS identity selector nor a non-zero admin slot nor an admin-slot \
                       reference in the proxy's own bytecode was found."
            .to_string(),
        details: BTreeMap::new(),
        location: Some(Location::default()),
        remediation: "Confirm the proxy uses a supported pattern (Transparent or UUPS).".to_string(),
    }
}
