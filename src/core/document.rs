use crate::core::error::EngineError;
use crate::core::graph::EdgeType;
use chrono::Local;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One endpoint record inside a connection branch. `index` is the input
/// slot the edge lands on at the target node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub index: usize,
}

/// `source name -> edge-type name -> branches -> targets`, in document
/// order. Branch order is positional (branch 0 first) and significant.
pub type ConnectionMap = IndexMap<String, IndexMap<String, Vec<Vec<ConnectionTarget>>>>;

fn default_parameters() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Raw node record as stored in the document. Everything the engine does
/// not interpret (parameters, credentials, positions, vendor fields) is
/// carried through untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "typeVersion", skip_serializing_if = "Option::is_none")]
    pub type_version: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The pipeline document: a flat node list plus the name-keyed edge map.
///
/// Unknown top-level fields round-trip unchanged; the engine only reads the
/// two collections it owns and adds to the connections map during repair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: ConnectionMap,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl PipelineDocument {
    /// Parse a document from raw JSON text. Any parse failure is fatal;
    /// no partial load is kept.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, EngineError> {
        let document: PipelineDocument = serde_json::from_str(text)
            .map_err(|err| EngineError::malformed(origin.display().to_string(), err.to_string()))?;
        document.check_edge_vocabulary(origin)?;
        Ok(document)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// The edge-type vocabulary is closed; an unknown key would be silently
    /// lost the moment repair rewrites the map, so it fails the load.
    fn check_edge_vocabulary(&self, origin: &Path) -> Result<(), EngineError> {
        for edge_types in self.connections.values() {
            for edge_type_name in edge_types.keys() {
                if EdgeType::from_wire(edge_type_name).is_none() {
                    return Err(EngineError::malformed(
                        origin.display().to_string(),
                        format!("unknown edge type '{}' in connections map", edge_type_name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Serialize with two-space indentation and a trailing newline, so
    /// repeated runs on identical documents produce byte-identical files.
    pub fn to_pretty_json(&self) -> Result<String, EngineError> {
        let mut text = serde_json::to_string_pretty(self).map_err(|err| {
            EngineError::malformed("<in-memory document>", err.to_string())
        })?;
        text.push('\n');
        Ok(text)
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        fs::write(path, self.to_pretty_json()?)?;
        Ok(())
    }

    /// Append an edge to the document-side connections map, creating the
    /// source entry, edge-type entry, and intermediate empty branches as
    /// needed. Idempotent on the full identity tuple.
    pub fn add_connection(
        &mut self,
        source: &str,
        edge_type: EdgeType,
        target: &str,
        branch: usize,
        slot: usize,
    ) -> bool {
        let edge_types = self.connections.entry(source.to_string()).or_default();
        let branches = edge_types
            .entry(edge_type.wire_name().to_string())
            .or_default();
        while branches.len() <= branch {
            branches.push(Vec::new());
        }
        let record = ConnectionTarget {
            node: target.to_string(),
            kind: edge_type.wire_name().to_string(),
            index: slot,
        };
        if branches[branch].contains(&record) {
            return false;
        }
        branches[branch].push(record);
        true
    }

    pub fn node_by_name(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Write a timestamped copy of the original document text next to the
/// document, returning the backup path. Called immediately before any
/// overwrite so a failed write never costs the original.
pub fn write_backup(path: &Path, original_text: &str) -> Result<PathBuf, EngineError> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("pipeline");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_name = format!("{}_backup_{}.json", stem, stamp);
    let backup_path = path.with_file_name(backup_name);
    fs::write(&backup_path, original_text)?;
    Ok(backup_path)
}
