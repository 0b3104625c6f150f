use crate::core::graph::EdgeType;
use crate::core::pipeline::Pipeline;
use crate::core::repair::RepairAction;
use crate::core::validate::Finding;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Aggregate connectivity counts.
#[derive(Debug, Clone, Serialize)]
pub struct ReportStats {
    pub total_nodes: usize,
    pub connected_nodes: usize,
    pub orphaned: usize,
    pub dead_ends: usize,
    pub percent_connected: f64,
}

/// Per-node predecessor/successor listing, one line per edge.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDetail {
    pub name: String,
    pub kind: String,
    pub category: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Machine- and human-readable summary of a validation or repair run.
///
/// Node names are sorted lexicographically before emission, so repeated
/// runs on identical graphs render byte-identical output regardless of
/// input map ordering. Regression tests rely on this.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub stats: ReportStats,
    pub categories: BTreeMap<String, usize>,
    pub nodes: Vec<NodeDetail>,
    pub findings: Vec<Finding>,
    pub actions: Vec<RepairAction>,
}

impl Report {
    pub fn build(pipeline: &Pipeline, findings: &[Finding], actions: &[RepairAction]) -> Self {
        let graph = &pipeline.graph;
        let total_nodes = graph.len();
        let connected_nodes = graph
            .node_ids()
            .filter(|&id| !graph.is_isolated(id))
            .count();
        let orphaned = findings
            .iter()
            .filter(|finding| finding.rule_id == "FM-VAL-002")
            .count();
        let dead_ends = findings
            .iter()
            .filter(|finding| finding.rule_id == "FM-VAL-004")
            .count();
        let percent_connected = if total_nodes == 0 {
            100.0
        } else {
            connected_nodes as f64 * 100.0 / total_nodes as f64
        };

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for id in graph.node_ids() {
            *categories
                .entry(graph.node(id).category.to_string())
                .or_insert(0) += 1;
        }

        let mut ids: Vec<_> = graph.node_ids().collect();
        ids.sort_by(|&a, &b| graph.node(a).name.cmp(&graph.node(b).name));

        let nodes = ids
            .into_iter()
            .map(|id| {
                let node = graph.node(id);
                let mut inputs = Vec::new();
                let mut outputs = Vec::new();
                for edge_type in EdgeType::ALL {
                    for source in graph.incoming(id, edge_type) {
                        inputs.push(format!(
                            "{} ({})",
                            graph.node(source).name,
                            edge_type.wire_name()
                        ));
                    }
                    for (branch, targets) in graph.outgoing(id, edge_type).iter().enumerate() {
                        for edge in targets {
                            outputs.push(format!(
                                "{} ({}[{}])",
                                graph.node(edge.target).name,
                                edge_type.wire_name(),
                                branch
                            ));
                        }
                    }
                }
                inputs.sort_unstable();
                NodeDetail {
                    name: node.name.clone(),
                    kind: node.kind.clone(),
                    category: node.category.to_string(),
                    inputs,
                    outputs,
                }
            })
            .collect();

        Report {
            stats: ReportStats {
                total_nodes,
                connected_nodes,
                orphaned,
                dead_ends,
                percent_connected,
            },
            categories,
            nodes,
            findings: findings.to_vec(),
            actions: actions.to_vec(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Pipeline integrity report");
        let _ = writeln!(out, "=========================");
        let _ = writeln!(
            out,
            "Nodes: {} total, {} connected ({:.1}%), {} orphaned, {} dead ends",
            self.stats.total_nodes,
            self.stats.connected_nodes,
            self.stats.percent_connected,
            self.stats.orphaned,
            self.stats.dead_ends,
        );

        let _ = writeln!(out);
        let _ = writeln!(out, "By category:");
        for (category, count) in &self.categories {
            let _ = writeln!(out, "  {}: {}", category, count);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Findings ({}):", self.findings.len());
        for finding in &self.findings {
            let location = finding.node.as_deref().unwrap_or("<pipeline>");
            let _ = writeln!(
                out,
                "  [{}] {} {}: {}",
                finding.severity, finding.rule_id, location, finding.detail
            );
            if let Some(suggestion) = &finding.suggestion {
                let _ = writeln!(out, "      suggestion: {}", suggestion);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Repair actions ({}):", self.actions.len());
        for action in &self.actions {
            let _ = writeln!(out, "  {}", action);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Node detail:");
        for node in &self.nodes {
            let _ = writeln!(out, "  {}", node.name);
            let _ = writeln!(out, "    kind: {}, category: {}", node.kind, node.category);
            for input in &node.inputs {
                let _ = writeln!(out, "    <- {}", input);
            }
            for output in &node.outputs {
                let _ = writeln!(out, "    -> {}", output);
            }
        }
        out
    }
}
