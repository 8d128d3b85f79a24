//! Workflow graph validation
//!
//! A tree is well-formed when:
//!
//! - its root is the one and only `start` node
//! - node ids are non-empty and unique
//! - no node id re-appears on its own path (no cycles)
//! - only container nodes (`branch`, `condition`, `execute_result_branch`)
//!   populate `branches`, and their arms have the allowed types
//! - `end` nodes have no successor
//!
//! On top of the structure, each node must carry the configuration its type
//! needs and its selectors must be well-formed. Validation never mutates the
//! tree it is given; [`mark_validated`] and [`ValidatedGraph::new`] work on a
//! tree they own.

use std::collections::{HashMap, HashSet};
use std::fmt;

use certflow_common::NodeId;
use tracing::{debug, warn};

use crate::config::{keys, NodeConfig};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{WorkflowNode, WorkflowNodeType};
use crate::reference::OutputRef;

/// Validation error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Graph shape problem (start node, cycles, containers)
    Structure,
    /// Incomplete or malformed node configuration
    Node,
    /// Malformed cross-node selector
    Reference,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Structure => write!(f, "Structure"),
            ErrorCategory::Node => write!(f, "Node"),
            ErrorCategory::Reference => write!(f, "Reference"),
        }
    }
}

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub category: ErrorCategory,
    /// Offending node, if the error is attributable to one
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            node_id: None,
            message: message.into(),
        }
    }

    pub fn at(category: ErrorCategory, node_id: &NodeId, message: impl Into<String>) -> Self {
        Self {
            category,
            node_id: Some(node_id.clone()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "[{}] node '{}': {}", self.category, id, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

/// Validation result containing all errors found
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors of one category
    pub fn errors_of(&self, category: ErrorCategory) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.category == category)
    }

    /// Ids of nodes with at least one attributable error
    pub fn failing_nodes(&self) -> HashSet<&NodeId> {
        self.errors.iter().filter_map(|e| e.node_id.as_ref()).collect()
    }
}

// ============================================================================
// Tree validation
// ============================================================================

/// Validate a tree without modifying it
pub fn validate_tree(root: &WorkflowNode) -> ValidationResult {
    let mut result = ValidationResult::new();

    if root.node_type != WorkflowNodeType::Start {
        result.add_error(ValidationError::at(
            ErrorCategory::Structure,
            &root.id,
            format!("root node must be 'start', found '{}'", root.node_type),
        ));
    }

    let mut walker = Walker {
        result: &mut result,
        seen: HashSet::new(),
        path: Vec::new(),
        start_count: 0,
    };
    walker.visit(root, None);
    let start_count = walker.start_count;

    if start_count != 1 {
        result.add_error(ValidationError::new(
            ErrorCategory::Structure,
            format!("graph must have exactly one 'start' node, found {}", start_count),
        ));
    }

    debug!(
        root = %root.id,
        errors = result.errors.len(),
        "Validated workflow graph"
    );
    result
}

struct Walker<'r, 'a> {
    result: &'r mut ValidationResult,
    seen: HashSet<&'a str>,
    /// Ids on the path from the root to the current node
    path: Vec<&'a str>,
    start_count: usize,
}

impl<'r, 'a> Walker<'r, 'a> {
    fn visit(&mut self, node: &'a WorkflowNode, parent: Option<WorkflowNodeType>) {
        let id = node.id.as_str();

        if self.path.contains(&id) {
            self.result.add_error(ValidationError::at(
                ErrorCategory::Structure,
                &node.id,
                "cycle detected: node is reachable from itself",
            ));
            return;
        }

        if id.is_empty() {
            self.result.add_error(ValidationError::new(
                ErrorCategory::Structure,
                format!("a '{}' node has an empty id", node.node_type),
            ));
        } else if !self.seen.insert(id) {
            self.result.add_error(ValidationError::at(
                ErrorCategory::Structure,
                &node.id,
                "duplicate node id",
            ));
        }

        if node.node_type == WorkflowNodeType::Start {
            self.start_count += 1;
        }

        self.check_placement(node, parent);
        check_node(node, self.result);

        self.path.push(id);
        for branch in &node.branches {
            self.visit(branch, Some(node.node_type));
        }
        if let Some(next) = node.next.as_deref() {
            self.visit(next, None);
        }
        self.path.pop();
    }

    fn check_placement(&mut self, node: &WorkflowNode, parent: Option<WorkflowNodeType>) {
        match parent {
            Some(container) => {
                if let Some(allowed) = container.allowed_arms() {
                    if !allowed.contains(&node.node_type) {
                        self.result.add_error(ValidationError::at(
                            ErrorCategory::Structure,
                            &node.id,
                            format!(
                                "'{}' node cannot be an arm of a '{}' node",
                                node.node_type, container
                            ),
                        ));
                    }
                }
            }
            None => {
                if node.node_type.is_arm_only() {
                    self.result.add_error(ValidationError::at(
                        ErrorCategory::Structure,
                        &node.id,
                        format!("'{}' node must be an arm of a container", node.node_type),
                    ));
                }
            }
        }

        if node.node_type.is_container() {
            if node.node_type.allowed_arms().is_some() && node.branches.is_empty() {
                self.result.add_error(ValidationError::at(
                    ErrorCategory::Structure,
                    &node.id,
                    format!("'{}' node has no branches", node.node_type),
                ));
            }
        } else if !node.branches.is_empty() {
            self.result.add_error(ValidationError::at(
                ErrorCategory::Structure,
                &node.id,
                format!("'{}' node cannot have branches", node.node_type),
            ));
        }

        if node.node_type == WorkflowNodeType::End && node.next.is_some() {
            self.result.add_error(ValidationError::at(
                ErrorCategory::Structure,
                &node.id,
                "'end' node cannot have a successor",
            ));
        }
    }
}

fn require(node: &WorkflowNode, key: &str, result: &mut ValidationResult) {
    if node.get_config_value_as_string(key).trim().is_empty() {
        result.add_error(ValidationError::at(
            ErrorCategory::Node,
            &node.id,
            format!("'{}' is required", key),
        ));
    }
}

/// Per-node configuration and selector checks
fn check_node(node: &WorkflowNode, result: &mut ValidationResult) {
    match node.node_type {
        WorkflowNodeType::Apply => {
            for key in [keys::DOMAINS, keys::CONTACT_EMAIL, keys::PROVIDER] {
                require(node, key, result);
            }
        }
        WorkflowNodeType::Deploy => {
            require(node, keys::PROVIDER, result);

            let raw = node.get_config_value_as_string(keys::CERTIFICATE);
            if let Err(e) = OutputRef::parse(&raw) {
                result.add_error(ValidationError::at(
                    ErrorCategory::Reference,
                    &node.id,
                    format!("'{}': {}", keys::CERTIFICATE, e),
                ));
            }
        }
        WorkflowNodeType::Notify => {
            for key in [keys::CHANNEL, keys::SUBJECT, keys::MESSAGE] {
                require(node, key, result);
            }
        }
        _ => {}
    }

    for input in &node.inputs {
        if let Some(selector) = &input.value_selector {
            if selector.id.is_empty() || selector.name.is_empty() {
                result.add_error(ValidationError::at(
                    ErrorCategory::Reference,
                    &node.id,
                    format!("input '{}' has an incomplete value selector", input.name),
                ));
            }
        } else if input.required && input.value.is_none() {
            result.add_error(ValidationError::at(
                ErrorCategory::Node,
                &node.id,
                format!("required input '{}' has neither a value nor a selector", input.name),
            ));
        }
    }
}

/// Validate an owned tree and set each node's `validated` flag
///
/// A node is marked validated when no error is attributed to it. Errors about
/// the graph as a whole clear the root's flag, so an invalid tree never comes
/// back with every node marked. Returns the marked tree together with the
/// full result.
pub fn mark_validated(mut root: WorkflowNode) -> (WorkflowNode, ValidationResult) {
    let result = validate_tree(&root);
    let failing: HashSet<String> = result
        .failing_nodes()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();

    set_flags(&mut root, &failing);
    if result.errors.iter().any(|e| e.node_id.is_none()) {
        root.validated = false;
    }
    (root, result)
}

fn set_flags(node: &mut WorkflowNode, failing: &HashSet<String>) {
    node.validated = !failing.contains(node.id.as_str());
    for branch in &mut node.branches {
        set_flags(branch, failing);
    }
    if let Some(next) = node.next.as_deref_mut() {
        set_flags(next, failing);
    }
}

// ============================================================================
// Validated graph
// ============================================================================

/// A workflow tree that passed validation, ready for execution
///
/// Node configurations are decoded once at construction.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    root: WorkflowNode,
    configs: HashMap<NodeId, NodeConfig>,
}

impl ValidatedGraph {
    /// Validate and take ownership of a tree
    pub fn new(root: WorkflowNode) -> WorkflowResult<Self> {
        let (root, result) = mark_validated(root);

        if !result.is_valid() {
            warn!(
                root = %root.id,
                errors = result.errors.len(),
                "Refusing to load invalid workflow graph"
            );
            return Err(WorkflowError::InvalidGraph {
                errors: result.errors,
            });
        }

        let configs = root
            .iter()
            .map(|node| (node.id.clone(), node.decode_config()))
            .collect();

        Ok(Self { root, configs })
    }

    pub fn root(&self) -> &WorkflowNode {
        &self.root
    }

    /// All nodes in pre-order
    pub fn nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.root.iter()
    }

    pub fn find_node(&self, id: &str) -> Option<&WorkflowNode> {
        self.root.find(id)
    }

    /// Decoded configuration of a node
    pub fn config(&self, id: &str) -> Option<&NodeConfig> {
        self.configs.get(id)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Give the tree back, e.g. to persist the updated `validated` flags
    pub fn into_inner(self) -> WorkflowNode {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowNodeIO;

    fn apply(id: &str) -> WorkflowNode {
        WorkflowNode::new(id, WorkflowNodeType::Apply)
            .with_config("domains", "example.com")
            .with_config("contactEmail", "ops@example.com")
            .with_config("provider", "cloudflare")
            .with_config("providerAccessId", "cf-1")
    }

    fn deploy(id: &str, certificate: &str) -> WorkflowNode {
        WorkflowNode::new(id, WorkflowNodeType::Deploy)
            .with_config("certificate", certificate)
            .with_config("provider", "local")
    }

    fn linear() -> WorkflowNode {
        WorkflowNode::new("start", WorkflowNodeType::Start).with_next(
            apply("apply").with_next(
                deploy("deploy", "apply#certificate")
                    .with_next(WorkflowNode::new("end", WorkflowNodeType::End)),
            ),
        )
    }

    #[test]
    fn test_linear_chain_passes() {
        let result = validate_tree(&linear());
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_validation_does_not_mutate_input() {
        let tree = linear();
        let before = tree.clone();
        let _ = validate_tree(&tree);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_two_start_nodes_fail() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
            .with_next(WorkflowNode::new("start-2", WorkflowNodeType::Start));

        let result = validate_tree(&tree);
        assert!(!result.is_valid());
        assert!(result
            .errors_of(ErrorCategory::Structure)
            .any(|e| e.message.contains("exactly one 'start'")));
    }

    #[test]
    fn test_root_must_be_start() {
        let result = validate_tree(&apply("apply"));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_cycle_fails() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start).with_next(
            apply("x").with_next(apply("y").with_next(apply("x"))),
        );

        let result = validate_tree(&tree);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("cycle") && e.node_id == Some(NodeId::new("x"))));
    }

    #[test]
    fn test_duplicate_ids_in_sibling_branches_fail() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start).with_next(
            WorkflowNode::new("branch", WorkflowNodeType::Branch)
                .with_branch(WorkflowNode::new("c", WorkflowNodeType::Condition))
                .with_branch(WorkflowNode::new("c", WorkflowNodeType::Condition)),
        );

        let result = validate_tree(&tree);
        assert!(result.errors.iter().any(|e| e.message == "duplicate node id"));
    }

    #[test]
    fn test_container_rules() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start).with_next(
            apply("apply")
                .with_branch(WorkflowNode::new("stray", WorkflowNodeType::Notify))
                .with_next(
                    WorkflowNode::new("result", WorkflowNodeType::ExecuteResultBranch)
                        .with_branch(WorkflowNode::new("ok", WorkflowNodeType::ExecuteSuccess))
                        .with_branch(WorkflowNode::new("bad", WorkflowNodeType::Condition))
                        .with_next(WorkflowNode::new("lonely", WorkflowNodeType::ExecuteFailure)),
                ),
        );

        let result = validate_tree(&tree);
        let messages: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("'apply' node cannot have branches")));
        assert!(messages.iter().any(|m| m.contains("cannot be an arm of a 'execute_result_branch'")));
        assert!(messages.iter().any(|m| m.contains("node 'lonely'")));
    }

    #[test]
    fn test_end_with_successor_fails() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start).with_next(
            WorkflowNode::new("end", WorkflowNodeType::End)
                .with_next(WorkflowNode::new("after", WorkflowNodeType::End)),
        );
        assert!(!validate_tree(&tree).is_valid());
    }

    #[test]
    fn test_malformed_certificate_selector_fails_at_load() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
            .with_next(deploy("deploy", "apply-certificate"));

        let result = validate_tree(&tree);
        assert_eq!(result.errors_of(ErrorCategory::Reference).count(), 1);
    }

    #[test]
    fn test_dangling_certificate_selector_passes_validation() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
            .with_next(deploy("deploy", "ghost#certificate"));

        assert!(validate_tree(&tree).is_valid());
    }

    #[test]
    fn test_required_inputs() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start).with_next(
            deploy("deploy", "apply#certificate")
                .with_input(WorkflowNodeIO::new("certificate", "certificate").required()),
        );
        assert_eq!(validate_tree(&tree).errors_of(ErrorCategory::Node).count(), 1);
    }

    #[test]
    fn test_mark_validated_sets_flags() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
            .with_next(WorkflowNode::new("apply", WorkflowNodeType::Apply));

        let (marked, result) = mark_validated(tree);
        assert!(!result.is_valid());
        assert!(marked.validated);
        assert!(!marked.find("apply").unwrap().validated);
    }

    #[test]
    fn test_mark_validated_graph_level_errors_clear_root() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
            .with_next(WorkflowNode::new("start-2", WorkflowNodeType::Start));

        let (marked, result) = mark_validated(tree);
        assert!(!result.is_valid());
        assert!(!marked.validated);
        assert!(!marked.iter().all(|n| n.validated));

        let (remarked, result) = mark_validated(linear());
        assert!(result.is_valid());
        assert!(remarked.iter().all(|n| n.validated));
    }

    #[test]
    fn test_validated_graph() {
        let graph = ValidatedGraph::new(linear()).unwrap();
        assert_eq!(graph.len(), 4);
        assert!(graph.nodes().all(|n| n.validated));
        assert!(graph.config("apply").and_then(NodeConfig::as_apply).is_some());
        assert_eq!(graph.find_node("deploy").map(|n| n.node_type), Some(WorkflowNodeType::Deploy));
    }

    #[test]
    fn test_validated_graph_refuses_invalid_tree() {
        let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
            .with_next(WorkflowNode::new("start-2", WorkflowNodeType::Start));

        let err = ValidatedGraph::new(tree).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidGraph { .. }));
    }
}
