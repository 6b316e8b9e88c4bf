//! Run report: what a pipeline run did, for humans and machines

use crate::error::Warning;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Rough token cost of one enhancement call
pub const TOKENS_PER_CALL: usize = 500;

/// Blended price of an even input/output token split
pub const USD_PER_MILLION_TOKENS: f64 = 0.375;

/// Overall outcome, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialSuccess => 2,
            RunStatus::Failure => 1,
        }
    }
}

/// Generated test counts by provenance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestCounts {
    pub template: usize,
    pub enhanced: usize,
}

impl TestCounts {
    pub fn total(&self) -> usize {
        self.template + self.enhanced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnhancementUsage {
    pub calls: usize,
    pub budget: usize,
    /// Candidates dropped by validation or the per-endpoint limit
    pub rejected: usize,
    pub estimated_tokens: usize,
    pub estimated_cost_usd: f64,
}

impl EnhancementUsage {
    pub fn new(calls: usize, budget: usize, rejected: usize) -> Self {
        Self {
            calls,
            budget,
            rejected,
            estimated_tokens: calls * TOKENS_PER_CALL,
            estimated_cost_usd: (calls * TOKENS_PER_CALL) as f64 * USD_PER_MILLION_TOKENS / 1_000_000.0,
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub contract_fingerprint: String,
    pub endpoints: usize,
    pub gaps_found: usize,
    pub gaps_below_threshold: usize,
    pub tests: TestCounts,
    pub enhancement: EnhancementUsage,
    pub files_written: Vec<String>,
    pub dry_run: bool,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.warnings.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text report
    pub fn to_report(&self) -> String {
        let mut lines = vec![
            "═══════════════════════════════════════════════════════════════".to_string(),
            format!(
                "GAPGEN RUN{}",
                if self.dry_run { " (dry run)" } else { "" }
            ),
            "═══════════════════════════════════════════════════════════════".to_string(),
            String::new(),
            format!("Contract:        {}", self.contract_fingerprint),
            format!("Endpoints:       {}", self.endpoints),
            format!(
                "Gaps:            {} found, {} below threshold",
                self.gaps_found, self.gaps_below_threshold
            ),
            format!(
                "Tests:           {} ({} template, {} enhanced)",
                self.tests.total(),
                self.tests.template,
                self.tests.enhanced
            ),
            format!(
                "Enhancement:     {}/{} calls, {} rejected, ~{} tokens (~${:.4})",
                self.enhancement.calls,
                self.enhancement.budget,
                self.enhancement.rejected,
                self.enhancement.estimated_tokens,
                self.enhancement.estimated_cost_usd
            ),
            format!("Duration:        {} ms", self.duration_ms()),
        ];

        if self.dry_run {
            lines.push(format!("Would write:     {} files", self.files_written.len()));
        } else {
            lines.push(format!("Files written:   {}", self.files_written.len()));
        }
        for file in &self.files_written {
            lines.push(format!("  {}", file));
        }

        if !self.warnings.is_empty() {
            lines.push(String::new());
            lines.push(format!("Warnings ({}):", self.warnings.len()));
            for warning in &self.warnings {
                lines.push(format!("  ⚠ {}", warning));
            }
        }

        lines.push(String::new());
        lines.push(match self.status() {
            RunStatus::Success => "✓ Success".to_string(),
            RunStatus::PartialSuccess => "◐ Partial success".to_string(),
            RunStatus::Failure => "✗ Failure".to_string(),
        });
        lines.join("\n")
    }

    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(RunReport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(warnings: Vec<Warning>) -> RunReport {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        RunReport {
            started_at: start,
            finished_at: start + chrono::Duration::milliseconds(1250),
            contract_fingerprint: "sha256:00ff".into(),
            endpoints: 3,
            gaps_found: 12,
            gaps_below_threshold: 2,
            tests: TestCounts {
                template: 10,
                enhanced: 3,
            },
            enhancement: EnhancementUsage::new(2, 5, 1),
            files_written: vec!["GetProductsTest.java".into()],
            dry_run: false,
            warnings,
        }
    }

    #[test]
    fn test_clean_run_is_success() {
        let r = report(vec![]);
        assert_eq!(r.status(), RunStatus::Success);
        assert_eq!(r.status().exit_code(), 0);
        assert_eq!(r.duration_ms(), 1250);
        assert_eq!(r.enhancement.estimated_tokens, 1000);
        assert_eq!(r.enhancement.estimated_cost_usd, 0.000375);
    }

    #[test]
    fn test_cost_estimate_scales_with_calls() {
        assert_eq!(EnhancementUsage::new(0, 5, 0).estimated_cost_usd, 0.0);
        let usage = EnhancementUsage::new(8, 10, 0);
        assert!((usage.estimated_cost_usd - 0.0015).abs() < 1e-12);
        assert!(report(vec![]).to_report().contains("~1000 tokens (~$0.0004)"));
    }

    #[test]
    fn test_warnings_make_partial_success() {
        let r = report(vec![Warning::CorpusUnitSkipped {
            unit: "tests/broken.py".into(),
            reason: "syntax error".into(),
        }]);
        assert_eq!(r.status().exit_code(), 2);
        let text = r.to_report();
        assert!(text.contains("Warnings (1):"));
        assert!(text.contains("tests/broken.py"));
        assert!(text.contains("13 (10 template, 3 enhanced)"));
    }

    #[test]
    fn test_json_round_trip() {
        let r = report(vec![]);
        let back: RunReport = serde_json::from_str(&r.to_json().unwrap()).unwrap();
        assert_eq!(back, r);
    }
}
