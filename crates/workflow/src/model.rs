//! Persisted workflow entities
//!
//! The JSON shape of [`Workflow`] and [`WorkflowNode`] is shared with the UI
//! and the import/export tooling, so field names and value shapes here are a
//! compatibility contract.

use std::fmt;

use certflow_common::{NodeId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::serde_compat::{empty_as_null, null_as_default, optional_time};

/// Record store collection holding workflows
pub const COLLECTION_NAME_WORKFLOW: &str = "workflow";

/// Output name under which apply nodes publish the issued certificate
pub const OUTPUT_NAME_CERTIFICATE: &str = "certificate";

/// Record metadata common to persisted entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub id: WorkflowId,
    #[serde(rename = "created", default, with = "optional_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updated", default, with = "optional_time")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// How a workflow is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowTrigger {
    /// Fired by the scheduler according to `triggerCron`
    Auto,
    #[default]
    Manual,
}

/// Outcome of the most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowRunStatus {
    /// Never run
    #[default]
    #[serde(rename = "")]
    None,
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

/// A user-authored automation workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(flatten)]
    pub meta: Meta,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger: WorkflowTrigger,
    #[serde(default)]
    pub trigger_cron: String,
    #[serde(default)]
    pub enabled: bool,
    /// Published, executable graph
    #[serde(default)]
    pub content: Option<WorkflowNode>,
    /// Editable, unpublished graph
    #[serde(default)]
    pub draft: Option<WorkflowNode>,
    #[serde(default)]
    pub has_draft: bool,
    #[serde(default)]
    pub last_run_id: String,
    #[serde(default)]
    pub last_run_status: WorkflowRunStatus,
    #[serde(default, with = "optional_time")]
    pub last_run_time: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Decode a persisted workflow record
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// True when a draft exists that differs from the published graph
    pub fn draft_differs(&self) -> bool {
        match &self.draft {
            Some(draft) => self.content.as_ref() != Some(draft),
            None => false,
        }
    }

    /// Recompute `has_draft` from the two graphs
    pub fn refresh_has_draft(&mut self) {
        self.has_draft = self.draft_differs();
    }
}

/// Node kinds of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNodeType {
    Start,
    End,
    Apply,
    Deploy,
    Notify,
    Branch,
    Condition,
    ExecuteResultBranch,
    ExecuteSuccess,
    ExecuteFailure,
}

impl WorkflowNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowNodeType::Start => "start",
            WorkflowNodeType::End => "end",
            WorkflowNodeType::Apply => "apply",
            WorkflowNodeType::Deploy => "deploy",
            WorkflowNodeType::Notify => "notify",
            WorkflowNodeType::Branch => "branch",
            WorkflowNodeType::Condition => "condition",
            WorkflowNodeType::ExecuteResultBranch => "execute_result_branch",
            WorkflowNodeType::ExecuteSuccess => "execute_success",
            WorkflowNodeType::ExecuteFailure => "execute_failure",
        }
    }

    /// Node types that hold sibling subgraphs in `branches`
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            WorkflowNodeType::Branch
                | WorkflowNodeType::Condition
                | WorkflowNodeType::ExecuteResultBranch
        )
    }

    /// Node types allowed as the arms of this container
    pub fn allowed_arms(&self) -> Option<&'static [WorkflowNodeType]> {
        match self {
            WorkflowNodeType::Branch => Some(&[WorkflowNodeType::Condition]),
            WorkflowNodeType::ExecuteResultBranch => Some(&[
                WorkflowNodeType::ExecuteSuccess,
                WorkflowNodeType::ExecuteFailure,
            ]),
            _ => None,
        }
    }

    /// Node types that may only appear as the arm of a container
    pub fn is_arm_only(&self) -> bool {
        matches!(
            self,
            WorkflowNodeType::Condition
                | WorkflowNodeType::ExecuteSuccess
                | WorkflowNodeType::ExecuteFailure
        )
    }
}

impl fmt::Display for WorkflowNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the workflow graph
///
/// `next` is the successor on the same path; `branches` holds the sibling
/// subgraphs of container nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: WorkflowNodeType,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", serialize_with = "empty_as_null")]
    pub config: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default", serialize_with = "empty_as_null")]
    pub inputs: Vec<WorkflowNodeIO>,
    #[serde(default, deserialize_with = "null_as_default", serialize_with = "empty_as_null")]
    pub outputs: Vec<WorkflowNodeIO>,
    #[serde(default)]
    pub next: Option<Box<WorkflowNode>>,
    #[serde(default, deserialize_with = "null_as_default", serialize_with = "empty_as_null")]
    pub branches: Vec<WorkflowNode>,
    #[serde(default)]
    pub validated: bool,
}

impl WorkflowNode {
    pub fn new(id: impl Into<NodeId>, node_type: WorkflowNodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: String::new(),
            config: Map::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            next: None,
            branches: Vec::new(),
            validated: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, input: WorkflowNodeIO) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: WorkflowNodeIO) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_next(mut self, next: WorkflowNode) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    pub fn with_branch(mut self, branch: WorkflowNode) -> Self {
        self.branches.push(branch);
        self
    }

    /// Pre-order walk: the node, its branches in order, then its successor
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { stack: vec![self] }
    }

    /// Find a node by id anywhere in this subgraph
    pub fn find(&self, id: &str) -> Option<&WorkflowNode> {
        self.iter().find(|node| node.id.as_str() == id)
    }

    /// Declared output port by name
    pub fn output(&self, name: &str) -> Option<&WorkflowNodeIO> {
        self.outputs.iter().find(|io| io.name == name)
    }
}

/// Iterator returned by [`WorkflowNode::iter`]
#[derive(Debug)]
pub struct NodeIter<'a> {
    stack: Vec<&'a WorkflowNode>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a WorkflowNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(next) = node.next.as_deref() {
            self.stack.push(next);
        }
        self.stack.extend(node.branches.iter().rev());
        Some(node)
    }
}

/// Input or output port of a node
///
/// A port carries either a literal `value` or a `value_selector` naming
/// another node's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNodeIO {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub io_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, with = "selector_object")]
    pub value_selector: Option<ValueSelector>,
}

impl WorkflowNodeIO {
    pub fn new(name: impl Into<String>, io_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            io_type: io_type.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_selector(mut self, id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        self.value_selector = Some(ValueSelector {
            id: id.into(),
            name: name.into(),
        });
        self
    }
}

/// Weak reference to another node's output, by node id and output name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSelector {
    #[serde(default)]
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
}

impl ValueSelector {
    fn is_unset(&self) -> bool {
        self.id.is_empty() && self.name.is_empty()
    }
}

/// An absent selector is persisted as `{"id":"","name":""}`.
mod selector_object {
    use super::*;

    pub(super) fn serialize<S: Serializer>(
        value: &Option<ValueSelector>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(selector) => selector.serialize(serializer),
            None => ValueSelector::default().serialize(serializer),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ValueSelector>, D::Error> {
        let selector = Option::<ValueSelector>::deserialize(deserializer)?;
        Ok(selector.filter(|s| !s.is_unset()))
    }
}
