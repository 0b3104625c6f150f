use crate::core::classify::Category;
use crate::core::error::EngineError;
use crate::core::graph::EdgeType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub const POLICY_VERSION: &str = "1";

/// Expected branch count for conditionals whose declared kind matches the
/// (case-insensitive substring) pattern.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BranchCardinality {
    pub kind_pattern: String,
    pub branches: usize,
}

/// One expected edge in the topology template. `source_pattern` is a regex
/// matched against node names; `target` is a concrete node name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpectedEdge {
    pub source_pattern: String,
    pub edge_type: EdgeType,
    pub target: String,
    #[serde(default)]
    pub branch: usize,
}

fn default_entry_count() -> usize {
    1
}

fn default_max_repair_passes() -> usize {
    5
}

/// Versioned configuration artifact driving validation and repair.
///
/// This consolidates what used to be hand-coded per-pipeline fix lists into
/// one declarative description of the expected topology.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnginePolicy {
    pub version: String,
    #[serde(default = "default_entry_count")]
    pub required_entry_count: usize,
    /// Node names treated as designated terminals.
    #[serde(default)]
    pub terminal_names: BTreeSet<String>,
    /// Node repairs target when filling empty or missing conditional
    /// branches. Must name an existing node to be usable.
    #[serde(default)]
    pub default_fallback: Option<String>,
    /// Whether one provider may attach to several consumers.
    #[serde(default)]
    pub allow_fan_in: bool,
    /// Attachments each consumer category must have exactly one of.
    #[serde(default)]
    pub required_attachments: BTreeMap<Category, BTreeSet<EdgeType>>,
    /// Attachments each consumer category may have at most one of.
    #[serde(default)]
    pub optional_attachments: BTreeMap<Category, BTreeSet<EdgeType>>,
    #[serde(default)]
    pub conditional_branch_cardinality: Vec<BranchCardinality>,
    /// Declarative expected-edge template consumed by the repair engine.
    #[serde(default)]
    pub expected_edges: Vec<ExpectedEdge>,
    #[serde(default = "default_max_repair_passes")]
    pub max_repair_passes: usize,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        let mut required_attachments = BTreeMap::new();
        required_attachments.insert(
            Category::Orchestrator,
            BTreeSet::from([EdgeType::LanguageModelLink]),
        );
        required_attachments.insert(
            Category::SubAgent,
            BTreeSet::from([EdgeType::LanguageModelLink]),
        );

        let mut optional_attachments = BTreeMap::new();
        optional_attachments.insert(
            Category::Orchestrator,
            BTreeSet::from([EdgeType::MemoryLink]),
        );
        optional_attachments.insert(Category::SubAgent, BTreeSet::from([EdgeType::MemoryLink]));

        EnginePolicy {
            version: POLICY_VERSION.to_string(),
            required_entry_count: 1,
            terminal_names: BTreeSet::new(),
            default_fallback: None,
            allow_fan_in: false,
            required_attachments,
            optional_attachments,
            conditional_branch_cardinality: vec![BranchCardinality {
                kind_pattern: ".if".to_string(),
                branches: 2,
            }],
            expected_edges: Vec::new(),
            max_repair_passes: 5,
        }
    }
}

impl EnginePolicy {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path)?;
        let policy: EnginePolicy = serde_yaml::from_str(&text).map_err(|err| EngineError::Policy {
            reason: format!("{}: {}", path.display(), err),
        })?;
        policy.check()?;
        Ok(policy)
    }

    /// Validate the artifact up front so a bad pattern fails the run
    /// instead of a repair pass halfway through.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.version != POLICY_VERSION {
            return Err(EngineError::Policy {
                reason: format!(
                    "unsupported policy version '{}', expected '{}'",
                    self.version, POLICY_VERSION
                ),
            });
        }
        if self.max_repair_passes == 0 {
            return Err(EngineError::Policy {
                reason: "max_repair_passes must be >= 1".to_string(),
            });
        }
        for expected in &self.expected_edges {
            Regex::new(&expected.source_pattern).map_err(|err| EngineError::Policy {
                reason: format!(
                    "invalid source_pattern '{}': {}",
                    expected.source_pattern, err
                ),
            })?;
        }
        Ok(())
    }

    /// Expected branch count for a conditional of the given declared kind,
    /// if the policy pins one.
    pub fn expected_branches(&self, kind: &str) -> Option<usize> {
        let lowered = kind.to_ascii_lowercase();
        self.conditional_branch_cardinality
            .iter()
            .find(|cardinality| lowered.contains(&cardinality.kind_pattern.to_ascii_lowercase()))
            .map(|cardinality| cardinality.branches)
    }

    /// Attachment types `category` must carry exactly one of.
    pub fn required_for(&self, category: Category) -> impl Iterator<Item = EdgeType> + '_ {
        self.required_attachments
            .get(&category)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Attachment types `category` may carry at most one of.
    pub fn optional_for(&self, category: Category) -> impl Iterator<Item = EdgeType> + '_ {
        self.optional_attachments
            .get(&category)
            .into_iter()
            .flatten()
            .copied()
    }
}
