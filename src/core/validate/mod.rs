use crate::core::graph::{ConnectionGraph, EdgeType};
use crate::core::policy::EnginePolicy;
use serde::Serialize;
use std::fmt;

pub mod rules;
pub use rules::built_in_rules;

/// Severity of a structural finding. ERROR blocks a clean verdict and is
/// what the repair engine acts on; WARNING is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Error => 2,
            Severity::Warning => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// Machine-readable hint attached to findings the repair engine knows how
/// to act on. Keeps repair logic free of detail-string parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairHint {
    /// Consumer is missing a required provider attachment.
    MissingAttachment { consumer: String, edge_type: EdgeType },
    /// Conditional has fewer branches than its kind requires.
    MissingBranches { conditional: String, expected: usize },
    /// An existing branch has zero targets.
    EmptyBranch { conditional: String, branch: usize },
    /// Node lacks a structurally required main-path edge; only the
    /// topology template can say where it belongs.
    Disconnected { node: String },
}

/// Individual structural finding emitted by a validation rule.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub node: Option<String>,
    pub detail: String,
    pub suggestion: Option<String>,
    #[serde(skip)]
    pub hint: Option<RepairHint>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        node: Option<String>,
        detail: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Finding {
            rule_id: rule_id.into(),
            severity,
            node,
            detail: detail.into(),
            suggestion,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: RepairHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Trait implemented by structural validation rules. Rules only read; the
/// repair engine is the sole writer.
pub trait ValidationRule {
    fn check(&self, graph: &ConnectionGraph, policy: &EnginePolicy) -> Vec<Finding>;
}

/// Runs the ordered battery of built-in rules. Every rule is independent:
/// a run always enumerates all findings rather than stopping at the first.
pub struct ValidationRegistry {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        ValidationRegistry {
            rules: built_in_rules(),
        }
    }

    /// Run every rule. Results are sorted by
    /// `(severity desc, rule_id asc, node asc)` so repeated runs on the
    /// same graph are byte-identical when rendered.
    pub fn run(&self, graph: &ConnectionGraph, policy: &EnginePolicy) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            findings.extend(rule.check(graph, policy));
        }
        findings.sort_by(|a, b| {
            b.severity
                .rank()
                .cmp(&a.severity.rank())
                .then_with(|| a.rule_id.cmp(&b.rule_id))
                .then_with(|| a.node.cmp(&b.node))
        });
        findings
    }
}

impl Default for ValidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
