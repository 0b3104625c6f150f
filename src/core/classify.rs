use crate::core::graph::ConnectionGraph;
use crate::core::policy::EnginePolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Functional category assigned to every pipeline node.
///
/// The set is closed; anything the classifier cannot place ends up as
/// `Config` with low confidence rather than failing the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Entry,
    Terminal,
    Orchestrator,
    SubAgent,
    CapabilityTool,
    LanguageModel,
    Memory,
    VectorStore,
    EmbeddingProvider,
    Conditional,
    Infrastructure,
    Config,
}

impl Category {
    /// Nodes expected to sit on the entry-to-terminal control-flow path.
    pub fn is_main_path(&self) -> bool {
        matches!(
            self,
            Category::Entry
                | Category::Terminal
                | Category::Orchestrator
                | Category::Conditional
                | Category::Infrastructure
        )
    }

    /// Auxiliary capability providers attached to a consumer node.
    pub fn is_provider(&self) -> bool {
        self.provider_edge_type().is_some()
    }

    /// The attachment edge type this category provides, if any.
    pub fn provider_edge_type(&self) -> Option<crate::core::graph::EdgeType> {
        use crate::core::graph::EdgeType;
        match self {
            Category::CapabilityTool => Some(EdgeType::Capability),
            Category::SubAgent => Some(EdgeType::Capability),
            Category::LanguageModel => Some(EdgeType::LanguageModelLink),
            Category::Memory => Some(EdgeType::MemoryLink),
            Category::VectorStore => Some(EdgeType::VectorStoreLink),
            Category::EmbeddingProvider => Some(EdgeType::EmbeddingLink),
            _ => None,
        }
    }

    /// Nodes that may consume capability attachments.
    pub fn is_attachment_consumer(&self) -> bool {
        matches!(self, Category::Orchestrator | Category::SubAgent)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Entry => "entry",
            Category::Terminal => "terminal",
            Category::Orchestrator => "orchestrator",
            Category::SubAgent => "sub_agent",
            Category::CapabilityTool => "capability_tool",
            Category::LanguageModel => "language_model",
            Category::Memory => "memory",
            Category::VectorStore => "vector_store",
            Category::EmbeddingProvider => "embedding_provider",
            Category::Conditional => "conditional",
            Category::Infrastructure => "infrastructure",
            Category::Config => "config",
        };
        write!(f, "{}", name)
    }
}

/// How confident the classifier is in the assigned category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// A declared-kind signature matched.
    Matched,
    /// Nothing matched; the node was defaulted to `Config`.
    Fallback,
}

/// Result of classifying a single raw node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub confidence: Confidence,
}

impl Classification {
    fn matched(category: Category) -> Self {
        Classification {
            category,
            confidence: Confidence::Matched,
        }
    }
}

/// Deterministic, total, ordered rule match over the declared kind string.
///
/// Never fails: unrecognized kinds fall through to `Config` with
/// `Confidence::Fallback`, which the validator surfaces as a warning.
pub fn classify(name: &str, kind: &str, policy: &EnginePolicy) -> Classification {
    let lowered = kind.to_ascii_lowercase();

    if policy.terminal_names.contains(name) {
        return Classification::matched(Category::Terminal);
    }
    if lowered.contains("trigger") || lowered.contains("webhook") {
        return Classification::matched(Category::Entry);
    }
    if lowered.contains("lmchat") {
        return Classification::matched(Category::LanguageModel);
    }
    if lowered.contains("memory") {
        return Classification::matched(Category::Memory);
    }
    if lowered.contains("vectorstore") {
        return Classification::matched(Category::VectorStore);
    }
    if lowered.contains("embedding") {
        return Classification::matched(Category::EmbeddingProvider);
    }
    if lowered.contains("toolcode") || lowered.contains("toolworkflow") {
        return Classification::matched(Category::CapabilityTool);
    }
    if lowered.ends_with("agenttool") {
        return Classification::matched(Category::SubAgent);
    }
    if lowered.ends_with(".agent") {
        // Orchestrator candidate; a structural pass may still downgrade it
        // to sub-agent once the edges are known.
        return Classification::matched(Category::Orchestrator);
    }
    if lowered.ends_with(".if") || lowered.ends_with(".switch") {
        return Classification::matched(Category::Conditional);
    }
    if lowered.contains("code")
        || lowered.contains("supabase")
        || lowered.contains("postgres")
        || lowered.contains("httprequest")
        || lowered.contains(".set")
        || lowered.contains("function")
        || lowered.contains("merge")
        || lowered.contains("noop")
    {
        return Classification::matched(Category::Infrastructure);
    }

    Classification {
        category: Category::Config,
        confidence: Confidence::Fallback,
    }
}

/// Structural pass run after the graph is built: an orchestrator candidate
/// whose only edges are outgoing capability attachments (no incoming main
/// edge) is really a delegated sub-agent, not a main-path decision node.
pub fn apply_structural_downgrade(graph: &mut ConnectionGraph) {
    use crate::core::graph::EdgeType;

    let downgrades: Vec<_> = graph
        .node_ids()
        .filter(|&id| {
            let node = graph.node(id);
            node.category == Category::Orchestrator
                && graph.incoming(id, EdgeType::Main).is_empty()
                && !graph.outgoing(id, EdgeType::Capability).is_empty()
                && graph.outgoing(id, EdgeType::Main).is_empty()
        })
        .collect();

    for id in downgrades {
        tracing::debug!(node = %graph.node(id).name, "downgrading orchestrator candidate to sub-agent");
        graph.set_category(id, Category::SubAgent);
    }
}
