//! Storage-layout differ (C5, §4.2)
//!
//! Pure, synchronous comparison of two storage layouts. Never suspends and
//! never touches the oracle or the chain; operates entirely on the
//! `Resolved` bundle the resolver already produced.

use crate::types::{AnalyzerOutcome, Confidence, Finding, Location, Severity, StorageEntry, StorageLayout};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

/// Runs the full storage-layout comparison and returns the analyzer outcome.
/// This analyzer is never `Skipped` or `Errored` from within this module --
/// a malformed layout is rejected earlier, by `StorageLayout::validate` in
/// the resolver (§8 property 6).
pub fn diff(old_layout: &StorageLayout, new_layout: &StorageLayout) -> AnalyzerOutcome {
    let mut findings = Vec::new();

    let old_non_gap: Vec<&StorageEntry> = old_layout.non_gap_entries().collect();
    let new_non_gap: Vec<&StorageEntry> = new_layout.non_gap_entries().collect();

    let new_by_key: HashMap<(u64, u8), &StorageEntry> = new_non_gap.iter().map(|e| (e.key(), *e)).collect();
    let new_labels_by_slot: HashMap<&str, u64> = new_non_gap.iter().map(|e| (e.label.as_str(), e.slot)).collect();

    for old_entry in &old_non_gap {
        match new_by_key.get(&old_entry.key()) {
            None => {
                let reappears_higher = new_labels_by_slot
                    .get(old_entry.label.as_str())
                    .is_some_and(|&slot| slot > old_entry.slot);
                if !reappears_higher {
                    findings.push(finding_stor_001(old_entry));
                }
            }
            Some(new_entry) => {
                if new_entry.length_bytes != old_entry.length_bytes {
                    findings.push(finding_stor_003(old_entry, new_entry));
                } else if new_entry.canonical_type != old_entry.canonical_type {
                    findings.push(finding_stor_004(old_entry, new_entry));
                } else if new_entry.label != old_entry.label {
                    findings.push(finding_stor_010(old_entry, new_entry));
                }
            }
        }
    }

    let max_old_slot = old_non_gap.iter().map(|e| e.slot).max().unwrap_or(0);
    let old_keys: std::collections::HashSet<(u64, u8)> = old_non_gap.iter().map(|e| e.key()).collect();

    let mut appended: Vec<&StorageEntry> = Vec::new();
    for new_entry in &new_non_gap {
        if old_keys.contains(&new_entry.key()) {
            continue;
        }
        if new_entry.slot <= max_old_slot {
            findings.push(finding_stor_002(new_entry));
        } else {
            appended.push(new_entry);
        }
    }
    let appended_new_var_count = appended.len();
    if appended_new_var_count > 0 {
        findings.push(finding_stor_009(&appended));
    }

    let old_gaps: Vec<&StorageEntry> = old_layout.gap_entries().collect();
    let new_gaps: Vec<&StorageEntry> = new_layout.gap_entries().collect();
    for g_old in &old_gaps {
        match new_gaps.iter().find(|g| g.slot == g_old.slot) {
            None => findings.push(finding_stor_008(g_old)),
            Some(g_new) => {
                let n_old = g_old.gap_len().unwrap_or(0);
                let n_new = g_new.gap_len().unwrap_or(0);
                if n_new + appended_new_var_count as u64 < n_old {
                    findings.push(finding_stor_007(g_old, n_old, n_new, appended_new_var_count));
                }
            }
        }
    }

    AnalyzerOutcome::Completed { findings }
}

fn location_for(entry: &StorageEntry) -> Location {
    Location {
        contract: Some(entry.origin.clone()),
        function: None,
        slot: Some(entry.slot),
        offset: Some(entry.offset),
    }
}

fn finding_stor_001(old_entry: &StorageEntry) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("label".to_string(), json!(old_entry.label));
    Finding {
        code: "STOR-001".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Storage variable deleted".to_string(),
        description: format!(
            "'{}' at slot {} offset {} has no counterpart in the new layout.",
            old_entry.label, old_entry.slot, old_entry.offset
        ),
        details,
        location: Some(location_for(old_entry)),
        remediation: "Restore the variable at its original slot or append new state only after the layout's \
                       final slot."
            .to_string(),
    }
}

fn finding_stor_002(new_entry: &StorageEntry) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("label".to_string(), json!(new_entry.label));
    Finding {
        code: "STOR-002".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Storage variable inserted mid-layout".to_string(),
        description: format!(
            "'{}' occupies slot {} offset {}, inside the range already used by the old layout.",
            new_entry.label, new_entry.slot, new_entry.offset
        ),
        details,
        location: Some(location_for(new_entry)),
        remediation: "Move new state variables to the end of the layout, after the highest slot used by the \
                       old implementation."
            .to_string(),
    }
}

fn finding_stor_003(old_entry: &StorageEntry, new_entry: &StorageEntry) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("old_length_bytes".to_string(), json!(old_entry.length_bytes));
    details.insert("new_length_bytes".to_string(), json!(new_entry.length_bytes));
    Finding {
        code: "STOR-003".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Storage variable width changed".to_string(),
        description: format!(
            "'{}' at slot {} offset {} changed width from {} to {} bytes.",
            old_entry.label, old_entry.slot, old_entry.offset, old_entry.length_bytes, new_entry.length_bytes
        ),
        details,
        location: Some(location_for(old_entry)),
        remediation: "Preserve the original storage width, or move the variable to a fresh slot.".to_string(),
    }
}

fn finding_stor_004(old_entry: &StorageEntry, new_entry: &StorageEntry) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("old_type".to_string(), json!(old_entry.canonical_type));
    details.insert("new_type".to_string(), json!(new_entry.canonical_type));
    Finding {
        code: "STOR-004".to_string(),
        severity: Severity::Critical,
        confidence: Confidence::High,
        title: "Storage variable semantics changed".to_string(),
        description: format!(
            "'{}' at slot {} offset {} changed type from '{}' to '{}'.",
            old_entry.label, old_entry.slot, old_entry.offset, old_entry.canonical_type, new_entry.canonical_type
        ),
        details,
        location: Some(location_for(old_entry)),
        remediation: "Preserve the original type, or move the variable to a fresh slot.".to_string(),
    }
}

fn finding_stor_007(g_old: &StorageEntry, n_old: u64, n_new: u64, appended: usize) -> Finding {
    let shortfall = n_old.saturating_sub(n_new + appended as u64);
    let mut details = BTreeMap::new();
    details.insert("old_gap_len".to_string(), json!(n_old));
    details.insert("new_gap_len".to_string(), json!(n_new));
    details.insert("appended_new_var_count".to_string(), json!(appended));
    details.insert("shortfall".to_string(), json!(shortfall));
    Finding {
        code: "STOR-007".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Storage gap insufficient".to_string(),
        description: format!(
            "Gap '{}' at slot {} shrank from {} to {} slots, and only {} new variable(s) were appended; \
             short by {} slot(s).",
            g_old.label, g_old.slot, n_old, n_new, appended, shortfall
        ),
        details,
        location: Some(location_for(g_old)),
        remediation: "Shrink the gap by exactly the number of slots consumed by newly appended variables."
            .to_string(),
    }
}

fn finding_stor_008(g_old: &StorageEntry) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("label".to_string(), json!(g_old.label));
    Finding {
        code: "STOR-008".to_string(),
        severity: Severity::High,
        confidence: Confidence::High,
        title: "Storage gap removed".to_string(),
        description: format!("Gap '{}' at slot {} has no counterpart in the new layout.", g_old.label, g_old.slot),
        details,
        location: Some(location_for(g_old)),
        remediation: "Restore the gap, shrinking it only by the number of slots newly consumed.".to_string(),
    }
}

fn finding_stor_009(appended: &[&StorageEntry]) -> Finding {
    let labels: Vec<&str> = appended.iter().map(|e| e.label.as_str()).collect();
    let mut details = BTreeMap::new();
    details.insert("appended".to_string(), json!(labels));
    Finding {
        code: "STOR-009".to_string(),
        severity: Severity::Medium,
        confidence: Confidence::High,
        title: "New storage variables appended".to_string(),
        description: format!("{} new variable(s) appended after the old layout's final slot: {}.", labels.len(), labels.join(", ")),
        details,
        location: None,
        remediation: "Confirm any storage gaps consumed by these variables were shrunk accordingly.".to_string(),
    }
}

fn finding_stor_010(old_entry: &StorageEntry, new_entry: &StorageEntry) -> Finding {
    let mut details = BTreeMap::new();
    details.insert("old_label".to_string(), json!(old_entry.label));
    details.insert("new_label".to_string(), json!(new_entry.label));
    Finding {
        code: "STOR-010".to_string(),
        severity: Severity::Low,
        confidence: Confidence::High,
        title: "Storage variable renamed".to_string(),
        description: format!(
            "Slot {} offset {} renamed from '{}' to '{}'; type and width unchanged.",
            old_entry.slot, old_entry.offset, old_entry.label, new_entry.label
        ),
        details,
        location: Some(location_for(new_entry)),
        remediation: "No action required; renames do not affect storage compatibility.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slot: u64, offset: u8, ty: &str, label: &str, index: u32) -> StorageEntry {
        StorageEntry {
            slot,
            offset,
            length_bytes: 32,
            canonical_type: ty.to_string(),
            label: label.to_string(),
            origin: "C".to_string(),
            declaration_index: index,
        }
    }

    #[test]
    fn safe_append_yields_only_stor_009() {
        let old = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0)],
        };
        let new = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), entry(1, 0, "address", "owner", 1)],
        };
        let outcome = diff(&old, &new);
        let findings = outcome.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "STOR-009");
    }

    #[test]
    fn variable_deleted_emits_stor_001() {
        let old = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), entry(1, 0, "address", "owner", 1)],
        };
        let new = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0)],
        };
        let outcome = diff(&old, &new);
        let findings = outcome.findings();
        assert!(findings.iter().any(|f| f.code == "STOR-001"));
    }

    #[test]
    fn mid_layout_insertion_emits_stor_002() {
        let old = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "a", 0), entry(2, 0, "uint256", "b", 1)],
        };
        let new = StorageLayout {
            entries: vec![
                entry(0, 0, "uint256", "a", 0),
                entry(1, 0, "uint256", "inserted", 1),
                entry(2, 0, "uint256", "b", 2),
            ],
        };
        let outcome = diff(&old, &new);
        let findings = outcome.findings();
        assert!(findings.iter().any(|f| f.code == "STOR-002"));
    }

    #[test]
    fn gap_shrunk_without_matching_appended_vars_emits_stor_007() {
        let mut old_gap = entry(10, 0, "uint256[50]", "__gap", 1);
        old_gap.label = "__gap".to_string();
        let mut new_gap = entry(10, 0, "uint256[49]", "__gap", 1);
        new_gap.label = "__gap".to_string();
        let old = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), old_gap],
        };
        let new = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), new_gap],
        };
        let outcome = diff(&old, &new);
        let findings = outcome.findings();
        assert!(findings.iter().any(|f| f.code == "STOR-007"));
    }

    #[test]
    fn gap_shrunk_exactly_by_appended_count_is_clean() {
        let mut old_gap = entry(10, 0, "uint256[50]", "__gap", 1);
        old_gap.label = "__gap".to_string();
        let mut new_gap = entry(10, 0, "uint256[49]", "__gap", 2);
        new_gap.label = "__gap".to_string();
        let old = StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), old_gap],
        };
        let new = StorageLayout {
            entries: vec![
                entry(0, 0, "uint256", "value", 0),
                entry(100, 0, "uint256", "added", 1),
                new_gap,
            ],
        };
        let outcome = diff(&old, &new);
        let findings = outcome.findings();
        assert!(!findings.iter().any(|f| f.code == "STOR-007"));
    }
}
