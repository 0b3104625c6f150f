use crate::core::classify::{Category, Classification, Confidence};
use crate::core::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Typed relation kinds between pipeline nodes.
///
/// Wire names match the on-disk connections map of the pipeline document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "ai_tool")]
    Capability,
    #[serde(rename = "ai_languageModel")]
    LanguageModelLink,
    #[serde(rename = "ai_memory")]
    MemoryLink,
    #[serde(rename = "ai_vectorStore")]
    VectorStoreLink,
    #[serde(rename = "ai_embedding")]
    EmbeddingLink,
}

impl EdgeType {
    pub const ALL: [EdgeType; 6] = [
        EdgeType::Main,
        EdgeType::Capability,
        EdgeType::LanguageModelLink,
        EdgeType::MemoryLink,
        EdgeType::VectorStoreLink,
        EdgeType::EmbeddingLink,
    ];

    /// Name used in the document's connections map.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EdgeType::Main => "main",
            EdgeType::Capability => "ai_tool",
            EdgeType::LanguageModelLink => "ai_languageModel",
            EdgeType::MemoryLink => "ai_memory",
            EdgeType::VectorStoreLink => "ai_vectorStore",
            EdgeType::EmbeddingLink => "ai_embedding",
        }
    }

    pub fn from_wire(name: &str) -> Option<EdgeType> {
        EdgeType::ALL
            .into_iter()
            .find(|edge_type| edge_type.wire_name() == name)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Opaque handle into the node arena. Stable for the lifetime of the graph,
/// so repairs never invalidate existing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// One endpoint inside a branch: the target node plus the input slot the
/// edge lands on at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeTarget {
    pub target: NodeId,
    pub slot: usize,
}

/// Graph-side view of a pipeline node.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub name: String,
    pub kind: String,
    pub category: Category,
    pub confidence: Confidence,
    pub disabled: bool,
}

/// Typed, branch-aware multigraph over the node arena.
///
/// A source node's edges of a given type form an ordered sequence of
/// branches, each branch an ordered list of targets (fan-out). Branch order
/// is positional and significant: branch 0 of a two-way conditional is the
/// true branch.
#[derive(Debug, Default, Clone)]
pub struct ConnectionGraph {
    nodes: Vec<GraphNode>,
    by_name: HashMap<String, NodeId>,
    adjacency: HashMap<(NodeId, EdgeType), Vec<Vec<EdgeTarget>>>,
    reverse: HashMap<(NodeId, EdgeType), BTreeSet<NodeId>>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        classification: Classification,
        disabled: bool,
    ) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len());
        self.by_name.insert(name.clone(), id);
        self.nodes.push(GraphNode {
            name,
            kind: kind.into(),
            category: classification.category,
            confidence: classification.confidence,
            disabled,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn set_category(&mut self, id: NodeId, category: Category) {
        self.nodes[id.0].category = category;
    }

    /// Insert a typed edge. Idempotent by the full identity tuple
    /// `(source, edge_type, target, branch, slot)`: re-adding an existing
    /// edge is a no-op and returns `Ok(false)`.
    ///
    /// Fails when either endpoint names a node that was never added.
    pub fn add_edge(
        &mut self,
        source: &str,
        edge_type: EdgeType,
        target: &str,
        branch: usize,
        slot: usize,
    ) -> Result<bool, EngineError> {
        let (source_id, target_id) = match (self.lookup(source), self.lookup(target)) {
            (Some(source_id), Some(target_id)) => (source_id, target_id),
            _ => {
                return Err(EngineError::DanglingReference {
                    source_node: source.to_string(),
                    target: target.to_string(),
                })
            }
        };

        let branches = self.adjacency.entry((source_id, edge_type)).or_default();
        while branches.len() <= branch {
            branches.push(Vec::new());
        }
        let entry = EdgeTarget {
            target: target_id,
            slot,
        };
        if branches[branch].contains(&entry) {
            return Ok(false);
        }
        branches[branch].push(entry);
        self.reverse
            .entry((target_id, edge_type))
            .or_default()
            .insert(source_id);
        Ok(true)
    }

    /// Ordered branches of ordered targets leaving `source` via `edge_type`.
    pub fn outgoing(&self, source: NodeId, edge_type: EdgeType) -> &[Vec<EdgeTarget>] {
        self.adjacency
            .get(&(source, edge_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sources with at least one `edge_type` edge into `target`, sorted by
    /// arena order for deterministic iteration.
    pub fn incoming(&self, target: NodeId, edge_type: EdgeType) -> Vec<NodeId> {
        self.reverse
            .get(&(target, edge_type))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Count of individual `edge_type` edges arriving at `target`, counting
    /// fan-out duplicates (a provider wired twice counts twice).
    pub fn incoming_edge_count(&self, target: NodeId, edge_type: EdgeType) -> usize {
        self.incoming(target, edge_type)
            .iter()
            .map(|&source| {
                self.outgoing(source, edge_type)
                    .iter()
                    .flatten()
                    .filter(|edge| edge.target == target)
                    .count()
            })
            .sum()
    }

    /// True when `source` has at least one non-empty branch of `edge_type`.
    pub fn has_outgoing(&self, source: NodeId, edge_type: EdgeType) -> bool {
        self.outgoing(source, edge_type)
            .iter()
            .any(|branch| !branch.is_empty())
    }

    /// True when the node participates in no edge of any type, in either
    /// direction.
    pub fn is_isolated(&self, id: NodeId) -> bool {
        EdgeType::ALL.into_iter().all(|edge_type| {
            !self.has_outgoing(id, edge_type) && self.incoming(id, edge_type).is_empty()
        })
    }

    /// Every edge as a `(source, edge_type, target, branch, slot)` name
    /// tuple, sorted. Used for superset assertions around repair.
    pub fn edge_tuples(&self) -> BTreeSet<(String, &'static str, String, usize, usize)> {
        let mut out = BTreeSet::new();
        for (&(source, edge_type), branches) in &self.adjacency {
            for (branch_index, branch) in branches.iter().enumerate() {
                for edge in branch {
                    out.insert((
                        self.node(source).name.clone(),
                        edge_type.wire_name(),
                        self.node(edge.target).name.clone(),
                        branch_index,
                        edge.slot,
                    ));
                }
            }
        }
        out
    }
}
