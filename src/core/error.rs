use crate::core::validate::Finding;

/// Failure taxonomy for the validation and repair engine.
///
/// Structural findings are deliberately *not* part of this enum: the
/// validator enumerates every finding in one pass and reports them as data,
/// while these variants abort the operation before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The document could not be parsed at all. No partial load is kept.
    #[error("malformed pipeline document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    /// An edge in the connections map names a node that does not exist.
    /// The field is not called `source`: thiserror reserves that name for
    /// the error-source chain.
    #[error("edge references unknown node: '{source_node}' -> '{target}'")]
    DanglingReference {
        source_node: String,
        target: String,
    },

    /// The repair pass bound was exhausted with ERROR findings remaining.
    #[error("repair halted with {} unresolved finding(s); extend the topology template to cover them", residual.len())]
    UnresolvedRepair { residual: Vec<Finding> },

    /// The policy artifact is unusable (bad YAML, invalid pattern, ...).
    #[error("invalid engine policy: {reason}")]
    Policy { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Process exit code associated with this error.
    ///
    /// 1 means the graph could not be brought to a clean state, 2 means the
    /// input (document or policy) was unusable.
    pub fn exit_code(&self) -> u8 {
        match self {
            EngineError::UnresolvedRepair { .. } => 1,
            EngineError::MalformedDocument { .. }
            | EngineError::DanglingReference { .. }
            | EngineError::Policy { .. }
            | EngineError::Io(_) => 2,
        }
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::MalformedDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
