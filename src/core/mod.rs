pub mod classify;
pub mod document;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod policy;
pub mod repair;
pub mod report;
pub mod validate;

pub use classify::{Category, Classification, Confidence};
pub use document::{NodeRecord, PipelineDocument};
pub use error::EngineError;
pub use graph::{ConnectionGraph, EdgeType, NodeId};
pub use pipeline::Pipeline;
pub use policy::EnginePolicy;
pub use repair::{RepairAction, RepairEngine, RepairOutcome};
pub use report::Report;
pub use validate::{Finding, Severity, ValidationRegistry};
