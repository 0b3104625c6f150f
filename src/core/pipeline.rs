use crate::core::classify::{self, Classification};
use crate::core::document::{NodeRecord, PipelineDocument};
use crate::core::error::EngineError;
use crate::core::graph::{ConnectionGraph, EdgeType, NodeId};
use crate::core::policy::EnginePolicy;
use std::collections::HashSet;
use std::path::Path;

/// A loaded pipeline: the document plus the classified connection graph
/// built from it. The two views are kept in sync — every mutation goes
/// through [`Pipeline::add_edge`] or [`Pipeline::add_node`], so the
/// persisted document always matches the re-validated graph.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub document: PipelineDocument,
    pub graph: ConnectionGraph,
}

impl Pipeline {
    pub fn load(path: &Path, policy: &EnginePolicy) -> Result<Self, EngineError> {
        let document = PipelineDocument::load(path)?;
        Self::from_document(document, policy, path)
    }

    /// Build the graph: classify every node, insert every edge, then run
    /// the structural downgrade pass for orchestrator candidates.
    pub fn from_document(
        document: PipelineDocument,
        policy: &EnginePolicy,
        origin: &Path,
    ) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for node in &document.nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(EngineError::malformed(
                    origin.display().to_string(),
                    format!("duplicate node name '{}'", node.name),
                ));
            }
        }

        let mut graph = ConnectionGraph::new();
        for node in &document.nodes {
            let classification = classify::classify(&node.name, &node.kind, policy);
            graph.add_node(
                &node.name,
                &node.kind,
                classification,
                node.disabled.unwrap_or(false),
            );
        }

        for (source, edge_types) in &document.connections {
            for (edge_type_name, branches) in edge_types {
                // The vocabulary was checked at parse time.
                let Some(edge_type) = EdgeType::from_wire(edge_type_name) else {
                    continue;
                };
                for (branch_index, branch) in branches.iter().enumerate() {
                    for target in branch {
                        graph.add_edge(
                            source,
                            edge_type,
                            &target.node,
                            branch_index,
                            target.index,
                        )?;
                    }
                }
            }
        }

        classify::apply_structural_downgrade(&mut graph);

        Ok(Pipeline { document, graph })
    }

    /// Add an edge to both views. Returns whether anything changed.
    pub fn add_edge(
        &mut self,
        source: &str,
        edge_type: EdgeType,
        target: &str,
        branch: usize,
        slot: usize,
    ) -> Result<bool, EngineError> {
        let inserted = self.graph.add_edge(source, edge_type, target, branch, slot)?;
        if inserted {
            self.document
                .add_connection(source, edge_type, target, branch, slot);
        }
        Ok(inserted)
    }

    /// Add a synthesized node to both views.
    pub fn add_node(&mut self, record: NodeRecord, classification: Classification) -> NodeId {
        let id = self.graph.add_node(
            &record.name,
            &record.kind,
            classification,
            record.disabled.unwrap_or(false),
        );
        self.document.nodes.push(record);
        id
    }

    /// The designated entry node. With an ambiguous entry set the trigger
    /// that feeds the main flow wins over a disconnected duplicate,
    /// lexicographic name breaks ties; the entry count rule still reports
    /// the extras.
    pub fn entry(&self) -> Option<NodeId> {
        crate::core::validate::rules::preferred_entry(&self.graph)
    }
}
