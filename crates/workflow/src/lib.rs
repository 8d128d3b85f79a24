//! Certflow workflow graph
//!
//! The user-authored automation graph: its persisted model, the provider
//! tables its nodes refer to, decoding of node configuration into typed
//! views, validation, and execution-time resolution of cross-node output
//! references.
//!
//! # Example
//!
//! ```
//! use certflow_workflow::{ValidatedGraph, WorkflowNode, WorkflowNodeType};
//!
//! let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
//!     .with_next(WorkflowNode::new("end", WorkflowNodeType::End));
//!
//! let graph = ValidatedGraph::new(tree).unwrap();
//! assert!(graph.find_node("end").is_some());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod provider;
pub mod reference;
mod serde_compat;
pub mod validation;

pub use config::{
    ApplyConfig, DeployConfig, NodeConfig, NotifyConfig, DEFAULT_SKIP_BEFORE_EXPIRY_DAYS,
};
pub use context::ExecutionContext;
pub use error::{ReferenceError, ResolveError, WorkflowError, WorkflowResult};
pub use model::{
    Meta, ValueSelector, Workflow, WorkflowNode, WorkflowNodeIO, WorkflowNodeType,
    WorkflowRunStatus, WorkflowTrigger, COLLECTION_NAME_WORKFLOW, OUTPUT_NAME_CERTIFICATE,
};
pub use provider::{AccessProviderType, ApplyDnsProviderType, DeployProviderType};
pub use reference::{OutputRef, REFERENCE_SEPARATOR};
pub use validation::{
    mark_validated, validate_tree, ErrorCategory, ValidatedGraph, ValidationError,
    ValidationResult,
};

impl Workflow {
    /// Validate the published graph for execution
    pub fn validated_content(&self) -> WorkflowResult<ValidatedGraph> {
        let content = self
            .content
            .clone()
            .ok_or(WorkflowError::MissingGraph("published"))?;
        ValidatedGraph::new(content)
    }
}
