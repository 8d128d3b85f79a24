//! Workflow error types

use certflow_common::NodeId;
use thiserror::Error;

use crate::validation::ValidationError;

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors raised when loading a workflow graph
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The graph failed structural or per-node validation
    #[error("workflow graph is invalid ({} error(s)): {}", .errors.len(), summarize(.errors))]
    InvalidGraph { errors: Vec<ValidationError> },

    /// The workflow has no graph to load
    #[error("workflow has no {0} graph")]
    MissingGraph(&'static str),

    /// The persisted workflow JSON could not be decoded
    #[error("failed to decode workflow: {0}")]
    Decode(#[from] serde_json::Error),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Malformed `<NodeId>#<OutputName>` selector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("output reference is empty")]
    Empty,

    #[error("output reference '{0}' is missing the '#' separator")]
    MissingSeparator(String),

    #[error("output reference '{0}' has an empty node id")]
    EmptyNodeId(String),

    #[error("output reference '{0}' has an empty output name")]
    EmptyOutputName(String),

    #[error("output reference '{0}' contains more than one '#'")]
    TooManySeparators(String),
}

/// Execution-time failure to resolve an output reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The selector itself is malformed
    #[error(transparent)]
    Malformed(#[from] ReferenceError),

    /// No node with this id exists in the graph
    #[error("referenced node '{0}' does not exist in the workflow")]
    UnknownNode(NodeId),

    /// The node exists but declares no output with this name
    #[error("node '{node}' declares no output named '{output}'")]
    UnknownOutput { node: NodeId, output: String },

    /// The output is declared but has not been produced yet
    #[error("output '{output}' of node '{node}' has not been produced")]
    OutputNotProduced { node: NodeId, output: String },

    /// A node that needs a reference has none configured
    #[error("node '{node}' has no {field} reference configured")]
    MissingReference { node: NodeId, field: &'static str },

    /// The node is not of the type the caller expected
    #[error("node '{node}' is a {actual} node, expected {expected}")]
    UnexpectedNodeType {
        node: NodeId,
        expected: &'static str,
        actual: &'static str,
    },
}
