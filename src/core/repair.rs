use crate::core::classify::{Category, Classification, Confidence};
use crate::core::document::NodeRecord;
use crate::core::error::EngineError;
use crate::core::graph::EdgeType;
use crate::core::pipeline::Pipeline;
use crate::core::policy::{EnginePolicy, ExpectedEdge};
use crate::core::validate::{Finding, RepairHint, ValidationRegistry};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// A single write performed by the repair engine. Synthesis only ever adds;
/// existing edges and nodes are never touched.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    AddEdge {
        source: String,
        edge_type: EdgeType,
        target: String,
        branch: usize,
        slot: usize,
    },
    AddNode {
        name: String,
        kind: String,
        category: Category,
    },
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairAction::AddEdge {
                source,
                edge_type,
                target,
                branch,
                ..
            } => write!(f, "add edge '{}' -[{}:{}]-> '{}'", source, edge_type, branch, target),
            RepairAction::AddNode { name, kind, .. } => {
                write!(f, "add placeholder node '{}' ({})", name, kind)
            }
        }
    }
}

/// Result of a bounded repair run. `findings` is the final validation
/// state after the last pass; error findings in it are unresolved.
#[derive(Debug)]
pub struct RepairOutcome {
    pub actions: Vec<RepairAction>,
    pub findings: Vec<Finding>,
    pub passes: usize,
}

impl RepairOutcome {
    pub fn residual_errors(&self) -> Vec<Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.is_error())
            .cloned()
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.residual_errors().is_empty()
    }
}

/// Template-driven repair engine: repair-then-reverify, bounded to
/// `max_repair_passes` so termination is guaranteed. Idempotent — running
/// it on an already-clean graph applies zero actions.
pub struct RepairEngine<'a> {
    policy: &'a EnginePolicy,
    templates: Vec<(Regex, &'a ExpectedEdge)>,
    registry: ValidationRegistry,
}

impl<'a> RepairEngine<'a> {
    pub fn new(policy: &'a EnginePolicy) -> Result<Self, EngineError> {
        let mut templates = Vec::with_capacity(policy.expected_edges.len());
        for expected in &policy.expected_edges {
            let regex = Regex::new(&expected.source_pattern).map_err(|err| EngineError::Policy {
                reason: format!(
                    "invalid source_pattern '{}': {}",
                    expected.source_pattern, err
                ),
            })?;
            templates.push((regex, expected));
        }
        Ok(RepairEngine {
            policy,
            templates,
            registry: ValidationRegistry::new(),
        })
    }

    pub fn repair(&self, pipeline: &mut Pipeline) -> Result<RepairOutcome, EngineError> {
        let mut actions = Vec::new();
        let mut findings = self.registry.run(&pipeline.graph, self.policy);
        let mut passes = 0;

        while passes < self.policy.max_repair_passes {
            let errors: Vec<Finding> = findings
                .iter()
                .filter(|finding| finding.is_error())
                .cloned()
                .collect();
            if errors.is_empty() {
                break;
            }
            passes += 1;

            let before = actions.len();
            for finding in &errors {
                self.apply_finding(pipeline, finding, &mut actions)?;
            }
            // Every write is re-validated before the engine reports success.
            findings = self.registry.run(&pipeline.graph, self.policy);

            if actions.len() == before {
                // No templated fix matched anything; more passes cannot help.
                break;
            }
        }

        let outcome = RepairOutcome {
            actions,
            findings,
            passes,
        };
        tracing::info!(
            passes = outcome.passes,
            actions = outcome.actions.len(),
            residual = outcome.residual_errors().len(),
            "repair finished"
        );
        Ok(outcome)
    }

    fn apply_finding(
        &self,
        pipeline: &mut Pipeline,
        finding: &Finding,
        actions: &mut Vec<RepairAction>,
    ) -> Result<(), EngineError> {
        match &finding.hint {
            Some(RepairHint::MissingBranches {
                conditional,
                expected,
            }) => {
                let Some(fallback) = self.usable_fallback(pipeline) else {
                    return Ok(());
                };
                let current = pipeline
                    .graph
                    .lookup(conditional)
                    .map(|id| pipeline.graph.outgoing(id, EdgeType::Main).len())
                    .unwrap_or(0);
                for branch in current..*expected {
                    self.add_edge(pipeline, conditional, EdgeType::Main, &fallback, branch, 0, actions)?;
                }
            }
            Some(RepairHint::EmptyBranch {
                conditional,
                branch,
            }) => {
                let Some(fallback) = self.usable_fallback(pipeline) else {
                    return Ok(());
                };
                self.add_edge(pipeline, conditional, EdgeType::Main, &fallback, *branch, 0, actions)?;
            }
            Some(RepairHint::MissingAttachment {
                consumer,
                edge_type,
            }) => {
                self.attach_provider(pipeline, consumer, *edge_type, actions)?;
            }
            Some(RepairHint::Disconnected { node }) => {
                self.apply_templates(pipeline, node, actions)?;
            }
            None => {}
        }
        Ok(())
    }

    fn usable_fallback(&self, pipeline: &Pipeline) -> Option<String> {
        let fallback = self.policy.default_fallback.as_deref()?;
        if pipeline.graph.lookup(fallback).is_none() {
            tracing::warn!(fallback, "default_fallback names no existing node");
            return None;
        }
        Some(fallback.to_string())
    }

    /// Satisfy a missing attachment: reuse the single unattached provider
    /// of the right category when one exists, otherwise synthesize a
    /// placeholder provider with a deterministic identifier. Multiple
    /// unattached candidates are ambiguous and left for manual wiring.
    fn attach_provider(
        &self,
        pipeline: &mut Pipeline,
        consumer: &str,
        edge_type: EdgeType,
        actions: &mut Vec<RepairAction>,
    ) -> Result<(), EngineError> {
        let mut candidates: Vec<String> = pipeline
            .graph
            .node_ids()
            .filter(|&id| {
                let node = pipeline.graph.node(id);
                node.category.provider_edge_type() == Some(edge_type)
                    && !pipeline.graph.has_outgoing(id, edge_type)
            })
            .map(|id| pipeline.graph.node(id).name.clone())
            .collect();
        candidates.sort_unstable();

        match candidates.len() {
            1 => {
                self.add_edge(pipeline, &candidates[0], edge_type, consumer, 0, 0, actions)?;
            }
            0 => {
                let Some((kind, suffix, category)) = placeholder_spec(edge_type) else {
                    // Capability tools need a consumer, not a placeholder;
                    // nothing sensible can be synthesized here.
                    return Ok(());
                };
                let name = format!("{} {}", consumer, suffix);
                if pipeline.graph.lookup(&name).is_some() {
                    return Ok(());
                }
                let record = NodeRecord {
                    id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
                    name: name.clone(),
                    kind: kind.to_string(),
                    type_version: Some(serde_json::json!(1)),
                    position: None,
                    parameters: serde_json::Value::Object(serde_json::Map::new()),
                    disabled: None,
                    extra: serde_json::Map::new(),
                };
                pipeline.add_node(
                    record,
                    Classification {
                        category,
                        confidence: Confidence::Matched,
                    },
                );
                actions.push(RepairAction::AddNode {
                    name: name.clone(),
                    kind: kind.to_string(),
                    category,
                });
                self.add_edge(pipeline, &name, edge_type, consumer, 0, 0, actions)?;
            }
            _ => {
                tracing::debug!(
                    consumer,
                    %edge_type,
                    candidates = candidates.len(),
                    "ambiguous unattached providers; leaving finding unresolved"
                );
            }
        }
        Ok(())
    }

    /// Look the disconnected node up in the topology template, in both
    /// roles: as a source whose name matches a pattern, and as the concrete
    /// target of a pattern matched by other nodes.
    fn apply_templates(
        &self,
        pipeline: &mut Pipeline,
        node: &str,
        actions: &mut Vec<RepairAction>,
    ) -> Result<(), EngineError> {
        let mut names: Vec<String> = pipeline
            .graph
            .node_ids()
            .map(|id| pipeline.graph.node(id).name.clone())
            .collect();
        names.sort_unstable();

        for (regex, expected) in &self.templates {
            if regex.is_match(node) && pipeline.graph.lookup(&expected.target).is_some() {
                self.add_edge(
                    pipeline,
                    node,
                    expected.edge_type,
                    &expected.target,
                    expected.branch,
                    0,
                    actions,
                )?;
            }
            if expected.target == node {
                for source in names.iter().filter(|name| name.as_str() != node) {
                    if regex.is_match(source) {
                        self.add_edge(
                            pipeline,
                            source,
                            expected.edge_type,
                            node,
                            expected.branch,
                            0,
                            actions,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn add_edge(
        &self,
        pipeline: &mut Pipeline,
        source: &str,
        edge_type: EdgeType,
        target: &str,
        branch: usize,
        slot: usize,
        actions: &mut Vec<RepairAction>,
    ) -> Result<(), EngineError> {
        if pipeline.add_edge(source, edge_type, target, branch, slot)? {
            tracing::debug!(source, %edge_type, target, branch, "synthesized edge");
            actions.push(RepairAction::AddEdge {
                source: source.to_string(),
                edge_type,
                target: target.to_string(),
                branch,
                slot,
            });
        }
        Ok(())
    }
}

fn placeholder_spec(edge_type: EdgeType) -> Option<(&'static str, &'static str, Category)> {
    match edge_type {
        EdgeType::LanguageModelLink => Some((
            "@n8n/n8n-nodes-langchain.lmChatOpenAi",
            "Language Model",
            Category::LanguageModel,
        )),
        EdgeType::MemoryLink => Some((
            "@n8n/n8n-nodes-langchain.memoryBufferWindow",
            "Memory",
            Category::Memory,
        )),
        EdgeType::VectorStoreLink => Some((
            "@n8n/n8n-nodes-langchain.vectorStoreSupabase",
            "Vector Store",
            Category::VectorStore,
        )),
        EdgeType::EmbeddingLink => Some((
            "@n8n/n8n-nodes-langchain.embeddingsOpenAi",
            "Embeddings",
            Category::EmbeddingProvider,
        )),
        EdgeType::Capability | EdgeType::Main => None,
    }
}
