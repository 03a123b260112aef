//! Report rendering (§6.3)
//!
//! Mechanical transform from `EngineResult` to a Markdown report. Pure and
//! deterministic: given the same `EngineResult`, byte-identical output
//! every time (§8 property 1).

use crate::types::{AnalyzerStatus, EngineResult, Severity, Verdict};

pub fn render(result: &EngineResult) -> String {
    let mut out = String::new();
    out.push_str("# Upgrade Safety Report\n\n");
    out.push_str(&format!("**Verdict:** {}\n\n", verdict_label(result.verdict)));

    if let Some(severity) = result.highest_severity {
        out.push_str(&format!("**Highest severity:** {}\n\n", severity_label(severity)));
    }

    out.push_str("## Analyzer status\n\n");
    for (name, status) in &result.analyzer_status {
        out.push_str(&format!("- `{name}`: {}\n", status_label(*status)));
    }
    out.push('\n');

    if result.findings.is_empty() {
        out.push_str("No findings.\n");
    } else {
        out.push_str("## Findings\n\n");
        for finding in &result.findings {
            out.push_str(&format!(
                "### {} — {} ({})\n\n{}\n\n**Remediation:** {}\n\n",
                finding.code,
                finding.title,
                severity_label(finding.severity),
                finding.description,
                finding.remediation
            ));
        }
    }

    out
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Safe => "Safe",
        Verdict::Unsafe => "Unsafe",
        Verdict::ReviewRequired => "Review required",
        Verdict::Incomplete => "Incomplete",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
    }
}

fn status_label(status: AnalyzerStatus) -> &'static str {
    match status {
        AnalyzerStatus::Completed => "completed",
        AnalyzerStatus::Skipped => "skipped",
        AnalyzerStatus::Errored => "errored",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn renders_verdict_and_empty_findings() {
        let result = EngineResult {
            verdict: Verdict::Safe,
            highest_severity: None,
            findings: vec![],
            analyzer_status: BTreeMap::new(),
            report_markdown: String::new(),
        };
        let rendered = render(&result);
        assert!(rendered.contains("Safe"));
        assert!(rendered.contains("No findings."));
    }
}
