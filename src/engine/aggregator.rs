//! Aggregator (C10, §4.7)
//!
//! Pure collapse of per-analyzer outcomes into a single verdict and a
//! deterministically ordered finding list. No analyzer is re-run here and
//! no I/O happens here.

use crate::types::{
    AnalyzerName, AnalyzerOutcome, AnalyzerStatus, EngineResult, Finding, Severity, Verdict, ALL_ANALYZERS,
};
use std::collections::BTreeMap;

/// Combines the seven analyzer outcomes (§2) into an `EngineResult`,
/// excluding `report_markdown` -- the orchestrator fills that in once it
/// has the rendered report (§6.3, mechanical transform kept out of C10).
pub fn aggregate(outcomes: &BTreeMap<AnalyzerName, AnalyzerOutcome>) -> EngineResult {
    let any_errored = ALL_ANALYZERS.iter().any(|name| {
        matches!(outcomes.get(name), Some(AnalyzerOutcome::Errored { .. }))
    });

    let mut ranked: Vec<(usize, Finding)> = Vec::new();
    if !any_errored {
        for (index, name) in ALL_ANALYZERS.iter().enumerate() {
            if let Some(AnalyzerOutcome::Completed { findings: f }) = outcomes.get(name) {
                ranked.extend(f.iter().cloned().map(|finding| (index, finding)));
            }
        }
    }
    sort_ranked_findings(&mut ranked);
    let findings: Vec<Finding> = ranked.into_iter().map(|(_, finding)| finding).collect();

    let highest_severity = if any_errored {
        None
    } else {
        findings.iter().map(|f| f.severity).max()
    };

    let verdict = if any_errored {
        Verdict::Incomplete
    } else {
        match highest_severity {
            Some(Severity::Critical) | Some(Severity::High) => Verdict::Unsafe,
            Some(Severity::Medium) => Verdict::ReviewRequired,
            Some(Severity::Low) | None => Verdict::Safe,
        }
    };

    let analyzer_status: BTreeMap<AnalyzerName, AnalyzerStatus> = ALL_ANALYZERS
        .iter()
        .map(|&name| {
            let status = outcomes
                .get(name)
                .map(|o| o.status())
                .unwrap_or(AnalyzerStatus::Skipped);
            (name, status)
        })
        .collect();

    EngineResult {
        verdict,
        highest_severity,
        findings,
        analyzer_status,
        report_markdown: String::new(),
    }
}

/// Orders by `(analyzer_index, finding code, location)`, the total order
/// §5 ("Ordering guarantees") specifies. `analyzer_index` is each finding's
/// position in `ALL_ANALYZERS`, attached during collection in `aggregate`,
/// so analyzer grouping survives the code/location tiebreakers below it.
fn sort_ranked_findings(ranked: &mut [(usize, Finding)]) {
    ranked.sort_by(|(a_index, a), (b_index, b)| {
        a_index.cmp(b_index).then_with(|| a.code.cmp(&b.code)).then_with(|| {
            let loc_key = |f: &Finding| {
                f.location
                    .as_ref()
                    .map(|l| (l.slot, l.offset, l.function.clone()))
                    .unwrap_or((None, None, None))
            };
            loc_key(a).cmp(&loc_key(b))
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, ANALYZER_ABI_DIFF, ANALYZER_ACCESS_CONTROL_REGRESSION,
        ANALYZER_INITIALIZER_INTEGRITY, ANALYZER_PROXY_DETECTION, ANALYZER_STORAGE_LAYOUT,
        ANALYZER_TRANSPARENT_SAFETY, ANALYZER_UUPS_SAFETY};

    fn empty_outcomes() -> BTreeMap<AnalyzerName, AnalyzerOutcome> {
        let mut m = BTreeMap::new();
        m.insert(ANALYZER_PROXY_DETECTION, AnalyzerOutcome::Completed { findings: vec![] });
        m.insert(ANALYZER_STORAGE_LAYOUT, AnalyzerOutcome::Completed { findings: vec![] });
        m.insert(ANALYZER_ABI_DIFF, AnalyzerOutcome::Completed { findings: vec![] });
        m.insert(ANALYZER_UUPS_SAFETY, AnalyzerOutcome::Completed { findings: vec![] });
        m.insert(ANALYZER_TRANSPARENT_SAFETY, AnalyzerOutcome::Skipped { reason: "proxy-type-is-uups".to_string() });
        m.insert(ANALYZER_INITIALIZER_INTEGRITY, AnalyzerOutcome::Completed { findings: vec![] });
        m.insert(ANALYZER_ACCESS_CONTROL_REGRESSION, AnalyzerOutcome::Completed { findings: vec![] });
        m
    }

    fn finding(code: &str, severity: Severity) -> Finding {
        Finding {
            code: code.to_string(),
            severity,
            confidence: Confidence::High,
            title: "t".to_string(),
            description: "d".to_string(),
            details: BTreeMap::new(),
            location: None,
            remediation: "r".to_string(),
        }
    }

    #[test]
    fn no_findings_yields_safe_and_all_completed() {
        let outcomes = empty_outcomes();
        let result = aggregate(&outcomes);
        assert_eq!(result.verdict, Verdict::Safe);
        assert!(result.analyzer_status.values().all(|s| *s == AnalyzerStatus::Completed || matches!(s, AnalyzerStatus::Skipped)));
    }

    #[test]
    fn critical_finding_forces_unsafe() {
        let mut outcomes = empty_outcomes();
        outcomes.insert(
            ANALYZER_STORAGE_LAYOUT,
            AnalyzerOutcome::Completed { findings: vec![finding("STOR-001", Severity::Critical)] },
        );
        let result = aggregate(&outcomes);
        assert_eq!(result.verdict, Verdict::Unsafe);
        assert_eq!(result.highest_severity, Some(Severity::Critical));
    }

    #[test]
    fn errored_analyzer_forces_incomplete_never_safe() {
        let mut outcomes = empty_outcomes();
        outcomes.insert(ANALYZER_ABI_DIFF, AnalyzerOutcome::Errored { message: "boom".to_string() });
        let result = aggregate(&outcomes);
        assert_eq!(result.verdict, Verdict::Incomplete);
        assert!(result.highest_severity.is_none());
    }

    #[test]
    fn medium_only_yields_review_required() {
        let mut outcomes = empty_outcomes();
        outcomes.insert(
            ANALYZER_STORAGE_LAYOUT,
            AnalyzerOutcome::Completed { findings: vec![finding("STOR-009", Severity::Medium)] },
        );
        let result = aggregate(&outcomes);
        assert_eq!(result.verdict, Verdict::ReviewRequired);
    }

    #[test]
    fn missing_analyzer_key_defaults_to_skipped_status() {
        let mut outcomes = empty_outcomes();
        outcomes.remove(ANALYZER_ACCESS_CONTROL_REGRESSION);
        let result = aggregate(&outcomes);
        assert_eq!(result.analyzer_status[ANALYZER_ACCESS_CONTROL_REGRESSION], AnalyzerStatus::Skipped);
    }

    #[test]
    fn findings_are_grouped_by_analyzer_before_code() {
        // ABI-002 sorts before STOR-001 lexicographically, but storage-layout
        // runs before abi-diff in ALL_ANALYZERS, so STOR-001 must come first.
        let mut outcomes = empty_outcomes();
        outcomes.insert(
            ANALYZER_STORAGE_LAYOUT,
            AnalyzerOutcome::Completed { findings: vec![finding("STOR-001", Severity::Critical)] },
        );
        outcomes.insert(
            ANALYZER_ABI_DIFF,
            AnalyzerOutcome::Completed { findings: vec![finding("ABI-002", Severity::High)] },
        );
        let result = aggregate(&outcomes);
        let codes: Vec<&str> = result.findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["STOR-001", "ABI-002"]);
    }
}
