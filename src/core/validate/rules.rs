use super::{Finding, RepairHint, Severity, ValidationRule};
use crate::core::classify::{Category, Confidence};
use crate::core::graph::{ConnectionGraph, EdgeType, NodeId};
use crate::core::policy::EnginePolicy;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::HashMap;

pub fn built_in_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(EntryCountRule),
        Box::new(OrphanRule),
        Box::new(ClassificationConfidenceRule),
        Box::new(DeadEndRule),
        Box::new(ReachabilityRule),
        Box::new(BranchCompletenessRule),
        Box::new(AttachmentCompletenessRule),
        Box::new(TypeFamilyRule),
    ]
}

const LANGCHAIN_FAMILY: &str = "@n8n/n8n-nodes-langchain.";
const BASE_FAMILY: &str = "n8n-nodes-base.";

/// FM-VAL-001: the pipeline must declare exactly the configured number of
/// entry nodes. Extras are removal candidates, not hard errors, because
/// deleting a trigger is never something the repair engine does on its own.
struct EntryCountRule;

impl ValidationRule for EntryCountRule {
    fn check(&self, graph: &ConnectionGraph, policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();
        let Some(live) = preferred_entry(graph) else {
            out.push(Finding::new(
                "FM-VAL-001",
                Severity::Error,
                None,
                "pipeline has no entry node",
                Some("add a trigger or webhook node".to_string()),
            ));
            return out;
        };

        let mut entries: Vec<&str> = graph
            .node_ids()
            .filter(|&id| graph.node(id).category == Category::Entry && id != live)
            .map(|id| graph.node(id).name.as_str())
            .collect();
        entries.sort_unstable();
        let total = entries.len() + 1;

        for extra in entries.iter().skip(policy.required_entry_count.saturating_sub(1)) {
            out.push(Finding::new(
                "FM-VAL-001",
                Severity::Warning,
                Some((*extra).to_string()),
                format!(
                    "found {} entry nodes but policy allows {}; '{}' is a removal candidate",
                    total, policy.required_entry_count, extra
                ),
                Some("remove or disable the duplicate trigger".to_string()),
            ));
        }
        out
    }
}

/// FM-VAL-002: nodes whose category requires at least one main or
/// attachment edge but that have none. Config and entry nodes are exempt.
struct OrphanRule;

impl ValidationRule for OrphanRule {
    fn check(&self, graph: &ConnectionGraph, _policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();
        for id in graph.node_ids() {
            let node = graph.node(id);
            match node.category {
                Category::Config | Category::Entry => continue,
                Category::CapabilityTool
                | Category::SubAgent
                | Category::LanguageModel
                | Category::Memory
                | Category::VectorStore
                | Category::EmbeddingProvider => {
                    let Some(edge_type) = node.category.provider_edge_type() else {
                        continue;
                    };
                    if !graph.has_outgoing(id, edge_type) {
                        out.push(
                            Finding::new(
                                "FM-VAL-002",
                                Severity::Error,
                                Some(node.name.clone()),
                                format!(
                                    "{} '{}' has no outgoing {} attachment; it is an orphan",
                                    node.category, node.name, edge_type
                                ),
                                Some(format!(
                                    "attach '{}' to a consumer via a {} edge",
                                    node.name, edge_type
                                )),
                            )
                            .with_hint(RepairHint::Disconnected {
                                node: node.name.clone(),
                            }),
                        );
                    }
                }
                Category::Orchestrator | Category::Conditional | Category::Infrastructure => {
                    let has_main = graph.has_outgoing(id, EdgeType::Main)
                        || !graph.incoming(id, EdgeType::Main).is_empty();
                    if !has_main {
                        out.push(
                            Finding::new(
                                "FM-VAL-002",
                                Severity::Error,
                                Some(node.name.clone()),
                                format!(
                                    "{} '{}' has no main-path edges; it is an orphan",
                                    node.category, node.name
                                ),
                                Some("wire the node into the main control flow".to_string()),
                            )
                            .with_hint(RepairHint::Disconnected {
                                node: node.name.clone(),
                            }),
                        );
                    }
                }
                Category::Terminal => {
                    if graph.incoming(id, EdgeType::Main).is_empty() {
                        out.push(
                            Finding::new(
                                "FM-VAL-002",
                                Severity::Error,
                                Some(node.name.clone()),
                                format!("terminal '{}' has no incoming main edge", node.name),
                                Some("connect the final processing step to the terminal".to_string()),
                            )
                            .with_hint(RepairHint::Disconnected {
                                node: node.name.clone(),
                            }),
                        );
                    }
                }
            }
        }
        out
    }
}

/// FM-VAL-003: surfaces low-confidence classifications. A config node with
/// zero connections is expected, so this stays a warning.
struct ClassificationConfidenceRule;

impl ValidationRule for ClassificationConfidenceRule {
    fn check(&self, graph: &ConnectionGraph, _policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();
        for id in graph.node_ids() {
            let node = graph.node(id);
            if node.confidence == Confidence::Fallback {
                out.push(Finding::new(
                    "FM-VAL-003",
                    Severity::Warning,
                    Some(node.name.clone()),
                    format!(
                        "declared kind '{}' matched no known signature; '{}' was defaulted to config",
                        node.kind, node.name
                    ),
                    Some("verify the node kind or extend the classifier signatures".to_string()),
                ));
            }
        }
        out
    }
}

/// FM-VAL-004: a non-terminal, non-auxiliary node that receives main flow
/// but sends none is a dead end.
struct DeadEndRule;

impl ValidationRule for DeadEndRule {
    fn check(&self, graph: &ConnectionGraph, _policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();
        for id in graph.node_ids() {
            let node = graph.node(id);
            if node.category == Category::Terminal
                || node.category == Category::Config
                || node.category.is_provider()
            {
                continue;
            }
            if !graph.incoming(id, EdgeType::Main).is_empty()
                && !graph.has_outgoing(id, EdgeType::Main)
            {
                out.push(
                    Finding::new(
                        "FM-VAL-004",
                        Severity::Error,
                        Some(node.name.clone()),
                        format!(
                            "{} '{}' receives main flow but has no outgoing main edge (dead end)",
                            node.category, node.name
                        ),
                        Some("route the node onward or designate it a terminal".to_string()),
                    )
                    .with_hint(RepairHint::Disconnected {
                        node: node.name.clone(),
                    }),
                );
            }
        }
        out
    }
}

/// FM-VAL-005: breadth-first traversal over main edges from the entry.
/// Every main-path node must be reachable and must lie on a path to some
/// terminal; unreached terminals are unreachable exits.
struct ReachabilityRule;

impl ValidationRule for ReachabilityRule {
    fn check(&self, graph: &ConnectionGraph, _policy: &EnginePolicy) -> Vec<Finding> {
        let Some(entry) = preferred_entry(graph) else {
            // FM-VAL-001 already reports the missing entry.
            return Vec::new();
        };

        let (digraph, index_of) = build_main_digraph(graph);
        let mut reachable = vec![false; graph.len()];
        let mut bfs = Bfs::new(&digraph, index_of[&entry]);
        while let Some(visited) = bfs.next(&digraph) {
            reachable[visited.index()] = true;
        }

        let terminals: Vec<NodeId> = graph
            .node_ids()
            .filter(|&id| graph.node(id).category == Category::Terminal)
            .collect();

        let mut out = Vec::new();
        for id in graph.node_ids() {
            let node = graph.node(id);
            match node.category {
                Category::Orchestrator | Category::Conditional | Category::Infrastructure => {
                    if !reachable[id.0] {
                        out.push(
                            Finding::new(
                                "FM-VAL-005",
                                Severity::Error,
                                Some(node.name.clone()),
                                format!(
                                    "{} '{}' is not reachable from entry '{}'",
                                    node.category,
                                    node.name,
                                    graph.node(entry).name
                                ),
                                Some("connect the node from a reachable predecessor".to_string()),
                            )
                            .with_hint(RepairHint::Disconnected {
                                node: node.name.clone(),
                            }),
                        );
                    } else if !terminals.is_empty() {
                        let reaches_exit = terminals.iter().any(|&terminal| {
                            has_path_connecting(&digraph, index_of[&id], index_of[&terminal], None)
                        });
                        if !reaches_exit {
                            out.push(
                                Finding::new(
                                    "FM-VAL-005",
                                    Severity::Error,
                                    Some(node.name.clone()),
                                    format!(
                                        "{} '{}' lies on no path to a terminal (dead branch)",
                                        node.category, node.name
                                    ),
                                    Some("route the branch to a terminal node".to_string()),
                                )
                                .with_hint(RepairHint::Disconnected {
                                    node: node.name.clone(),
                                }),
                            );
                        }
                    }
                }
                Category::Terminal => {
                    if !reachable[id.0] {
                        out.push(
                            Finding::new(
                                "FM-VAL-005",
                                Severity::Error,
                                Some(node.name.clone()),
                                format!(
                                    "terminal '{}' is not reachable from entry '{}' (unreachable exit)",
                                    node.name,
                                    graph.node(entry).name
                                ),
                                Some("connect the main flow through to this terminal".to_string()),
                            )
                            .with_hint(RepairHint::Disconnected {
                                node: node.name.clone(),
                            }),
                        );
                    }
                }
                _ => {}
            }
        }
        out
    }
}

/// FM-VAL-006: conditional branch count must match the cardinality policy
/// for its declared kind, and every branch must be populated. An empty
/// branch is a finding, never a crash.
struct BranchCompletenessRule;

impl ValidationRule for BranchCompletenessRule {
    fn check(&self, graph: &ConnectionGraph, policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();
        for id in graph.node_ids() {
            let node = graph.node(id);
            if node.category != Category::Conditional {
                continue;
            }
            let branches = graph.outgoing(id, EdgeType::Main);
            // A conditional is only a conditional with two or more branches.
            // The surplus bound applies only when the policy pins an exact
            // count for the kind; an unpinned multi-way switch is fine.
            let pinned = policy.expected_branches(&node.kind);
            let minimum = pinned.unwrap_or(2);

            if branches.len() < minimum {
                out.push(
                    Finding::new(
                        "FM-VAL-006",
                        Severity::Error,
                        Some(node.name.clone()),
                        format!(
                            "conditional '{}' declares {} of {} expected branches",
                            node.name,
                            branches.len(),
                            minimum
                        ),
                        Some("populate every output branch".to_string()),
                    )
                    .with_hint(RepairHint::MissingBranches {
                        conditional: node.name.clone(),
                        expected: minimum,
                    }),
                );
            } else if pinned.is_some_and(|expected| branches.len() > expected) {
                out.push(Finding::new(
                    "FM-VAL-006",
                    Severity::Error,
                    Some(node.name.clone()),
                    format!(
                        "conditional '{}' declares {} branches but its kind allows {}",
                        node.name,
                        branches.len(),
                        minimum
                    ),
                    Some("remove the surplus branches".to_string()),
                ));
            }

            for (branch_index, branch) in branches.iter().enumerate() {
                if branch.is_empty() {
                    out.push(
                        Finding::new(
                            "FM-VAL-006",
                            Severity::Error,
                            Some(node.name.clone()),
                            format!(
                                "conditional '{}' branch {} has zero targets",
                                node.name, branch_index
                            ),
                            Some("point the branch at a downstream node".to_string()),
                        )
                        .with_hint(RepairHint::EmptyBranch {
                            conditional: node.name.clone(),
                            branch: branch_index,
                        }),
                    );
                }
            }
        }
        out
    }
}

/// FM-VAL-007: required/optional provider attachments per consumer
/// category, plus the single-consumer constraint on providers.
struct AttachmentCompletenessRule;

impl ValidationRule for AttachmentCompletenessRule {
    fn check(&self, graph: &ConnectionGraph, policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();

        for id in graph.node_ids() {
            let node = graph.node(id);
            if node.category.is_attachment_consumer() {
                for edge_type in policy.required_for(node.category) {
                    let count = graph.incoming_edge_count(id, edge_type);
                    if count == 0 {
                        out.push(
                            Finding::new(
                                "FM-VAL-007",
                                Severity::Error,
                                Some(node.name.clone()),
                                format!(
                                    "{} '{}' is missing its required {} attachment",
                                    node.category, node.name, edge_type
                                ),
                                Some(format!("attach a provider via a {} edge", edge_type)),
                            )
                            .with_hint(RepairHint::MissingAttachment {
                                consumer: node.name.clone(),
                                edge_type,
                            }),
                        );
                    } else if count > 1 && !policy.allow_fan_in {
                        out.push(Finding::new(
                            "FM-VAL-007",
                            Severity::Error,
                            Some(node.name.clone()),
                            format!(
                                "{} '{}' has {} {} attachments; exactly one is allowed",
                                node.category, node.name, count, edge_type
                            ),
                            Some("detach the surplus providers".to_string()),
                        ));
                    }
                }
                for edge_type in policy.optional_for(node.category) {
                    let count = graph.incoming_edge_count(id, edge_type);
                    if count > 1 && !policy.allow_fan_in {
                        out.push(Finding::new(
                            "FM-VAL-007",
                            Severity::Error,
                            Some(node.name.clone()),
                            format!(
                                "{} '{}' has {} {} attachments; at most one is allowed",
                                node.category, node.name, count, edge_type
                            ),
                            Some("detach the surplus providers".to_string()),
                        ));
                    }
                }
            }

            // Provider side: attachments name exactly one consumer, and
            // that consumer must be able to hold capabilities.
            if let Some(edge_type) = node.category.provider_edge_type() {
                let consumers: Vec<NodeId> = graph
                    .outgoing(id, edge_type)
                    .iter()
                    .flatten()
                    .map(|edge| edge.target)
                    .collect();
                if consumers.len() > 1 && !policy.allow_fan_in {
                    out.push(Finding::new(
                        "FM-VAL-007",
                        Severity::Error,
                        Some(node.name.clone()),
                        format!(
                            "{} '{}' attaches to {} consumers; exactly one is allowed",
                            node.category,
                            node.name,
                            consumers.len()
                        ),
                        Some("split the provider or enable attachment fan-in".to_string()),
                    ));
                }
                for consumer in consumers {
                    if !graph.node(consumer).category.is_attachment_consumer() {
                        out.push(Finding::new(
                            "FM-VAL-007",
                            Severity::Error,
                            Some(node.name.clone()),
                            format!(
                                "{} '{}' attaches to '{}', which is a {} and cannot hold capabilities",
                                node.category,
                                node.name,
                                graph.node(consumer).name,
                                graph.node(consumer).category
                            ),
                            Some("point the attachment at an orchestrator or sub-agent".to_string()),
                        ));
                    }
                }
            }
        }
        out
    }
}

/// FM-VAL-008: narrow heuristic for kind strings from the wrong platform
/// family — an AI-family kind living purely on the main path, or a
/// base-family kind acting as a capability provider. Advisory only; the
/// engine never rewrites kinds on guessed intent.
struct TypeFamilyRule;

impl ValidationRule for TypeFamilyRule {
    fn check(&self, graph: &ConnectionGraph, _policy: &EnginePolicy) -> Vec<Finding> {
        let mut out = Vec::new();
        for id in graph.node_ids() {
            let node = graph.node(id);
            let has_attachment = EdgeType::ALL
                .into_iter()
                .filter(|&edge_type| edge_type != EdgeType::Main)
                .any(|edge_type| {
                    graph.has_outgoing(id, edge_type) || !graph.incoming(id, edge_type).is_empty()
                });
            let has_main = graph.has_outgoing(id, EdgeType::Main)
                || !graph.incoming(id, EdgeType::Main).is_empty();

            if node.kind.starts_with(LANGCHAIN_FAMILY)
                && matches!(node.category, Category::Infrastructure | Category::Config)
                && has_main
                && !has_attachment
            {
                let base_kind = node.kind.replace(LANGCHAIN_FAMILY, BASE_FAMILY);
                out.push(Finding::new(
                    "FM-VAL-008",
                    Severity::Warning,
                    Some(node.name.clone()),
                    format!(
                        "'{}' declares AI-family kind '{}' but participates only in main flow",
                        node.name, node.kind
                    ),
                    Some(format!("consider the base-family kind '{}'", base_kind)),
                ));
            }

            if node.kind.starts_with(BASE_FAMILY) && graph.has_outgoing(id, EdgeType::Capability) {
                out.push(Finding::new(
                    "FM-VAL-008",
                    Severity::Warning,
                    Some(node.name.clone()),
                    format!(
                        "'{}' acts as a capability provider but declares base-family kind '{}'",
                        node.name, node.kind
                    ),
                    Some("use the AI-family tool kind for capability providers".to_string()),
                ));
            }
        }
        out
    }
}

/// The entry traversal starts from: a trigger that actually feeds the main
/// flow wins over a disconnected duplicate, lexicographic name breaks ties.
pub(crate) fn preferred_entry(graph: &ConnectionGraph) -> Option<NodeId> {
    graph
        .node_ids()
        .filter(|&id| graph.node(id).category == Category::Entry)
        .min_by_key(|&id| {
            (
                !graph.has_outgoing(id, EdgeType::Main),
                graph.node(id).name.clone(),
            )
        })
}

fn build_main_digraph(graph: &ConnectionGraph) -> (DiGraph<(), ()>, HashMap<NodeId, NodeIndex>) {
    let mut digraph = DiGraph::<(), ()>::new();
    let mut index_of = HashMap::new();
    for id in graph.node_ids() {
        index_of.insert(id, digraph.add_node(()));
    }
    for id in graph.node_ids() {
        for branch in graph.outgoing(id, EdgeType::Main) {
            for edge in branch {
                digraph.add_edge(index_of[&id], index_of[&edge.target], ());
            }
        }
    }
    (digraph, index_of)
}
