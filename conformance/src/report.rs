//! Conformance report types: per-rule verdicts, outcomes, and aggregation.

use serde::Serialize;

use crate::rules::{Category, RequirementLevel, RuleDescriptor};
use crate::verifiers::Evidence;

/// Outcome of one rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The payload conforms.
    Pass,
    /// The payload violates the rule.
    Fail,
    /// The rule applied on paper but its precondition was absent.
    Skipped,
    /// The rule faulted; an engine defect, not a protocol violation.
    Error,
}

impl Outcome {
    /// Fixed-width tag for console output.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIP",
            Self::Error => "ERROR",
        }
    }
}

/// What a failing rule reports about the offending payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// What is wrong.
    pub message: String,
    /// URI of the resource at fault.
    pub destination: Option<String>,
    /// Offending payload excerpt.
    pub fragment: Option<String>,
    /// 1-based line of the offending node.
    pub line: Option<usize>,
}

impl Violation {
    /// A violation with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// A violation carrying a verifier's evidence.
    #[must_use]
    pub fn from_evidence(evidence: &Evidence) -> Self {
        Self {
            message: evidence.message.clone(),
            destination: None,
            fragment: evidence.fragment.clone(),
            line: evidence.line,
        }
    }

    /// Sets the destination URI.
    #[must_use]
    pub fn at(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the offending excerpt.
    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

/// The verdict of one rule against one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVerdict {
    /// Rule identifier.
    pub rule_id: &'static str,
    /// Rule category.
    pub category: Category,
    /// Requirement level.
    pub level: RequirementLevel,
    /// Rule description.
    pub description: &'static str,
    /// Protocol specification citations.
    pub citations: &'static [&'static str],
    /// Resource the rule ran against.
    pub uri: String,
    /// Outcome.
    pub outcome: Outcome,
    /// Present on `Fail`.
    pub violation: Option<Violation>,
    /// Reason for `Skipped`, fault for `Error`.
    pub message: Option<String>,
}

impl RuleVerdict {
    /// A verdict for `rule` against `uri`.
    #[must_use]
    pub fn new(rule: &RuleDescriptor, uri: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            rule_id: rule.id,
            category: rule.category,
            level: rule.level,
            description: rule.description,
            citations: rule.citations,
            uri: uri.into(),
            outcome,
            violation: None,
            message: None,
        }
    }

    /// A failing verdict.
    #[must_use]
    pub fn fail(rule: &RuleDescriptor, uri: impl Into<String>, violation: Violation) -> Self {
        let mut verdict = Self::new(rule, uri, Outcome::Fail);
        verdict.violation = Some(violation);
        verdict
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns true if this verdict is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Fail
    }

    /// One-line summary for console output.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.violation, &self.message) {
            (Some(v), _) => match v.line {
                Some(line) => format!("{} (line {line})", v.message),
                None => v.message.clone(),
            },
            (None, Some(message)) => message.clone(),
            (None, None) => self.description.to_string(),
        }
    }
}

/// A rule that was applicable but never started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotRun {
    /// Rule identifier.
    pub rule_id: &'static str,
    /// Resource it would have run against.
    pub uri: String,
}

/// Per-outcome tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Passing verdicts.
    pub pass: usize,
    /// Failing verdicts.
    pub fail: usize,
    /// Skipped verdicts.
    pub skipped: usize,
    /// Faulted rules.
    pub error: usize,
}

/// Aggregated conformance report across rules and resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConformanceReport {
    /// All verdicts, in completion order per resource.
    pub results: Vec<RuleVerdict>,
    /// Rules not started because the run was cancelled.
    pub not_run: Vec<NotRun>,
}

impl ConformanceReport {
    /// Creates a new empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a verdict to this report.
    pub fn push(&mut self, verdict: RuleVerdict) {
        self.results.push(verdict);
    }

    /// Extends this report with results from another report.
    pub fn extend(&mut self, other: ConformanceReport) {
        self.results.extend(other.results);
        self.not_run.extend(other.not_run);
    }

    /// Tallies verdicts by outcome.
    #[must_use]
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for verdict in &self.results {
            match verdict.outcome {
                Outcome::Pass => counts.pass += 1,
                Outcome::Fail => counts.fail += 1,
                Outcome::Skipped => counts.skipped += 1,
                Outcome::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Returns the count of failed rules.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.counts().fail
    }

    /// Returns the count of faulted rules.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.counts().error
    }

    /// Verdicts with the given outcome.
    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &RuleVerdict> {
        self.results.iter().filter(move |v| v.outcome == outcome)
    }

    /// Returns true if no rule failed or faulted.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        let counts = self.counts();
        counts.fail == 0 && counts.error == 0
    }
}
