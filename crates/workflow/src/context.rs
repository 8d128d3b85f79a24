//! Execution-time output registry
//!
//! Outputs only exist once the node producing them has run, so cross-node
//! references are resolved here rather than when the graph is decoded.

use std::collections::HashMap;

use certflow_common::{NodeId, RunId};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::NodeConfig;
use crate::error::ResolveError;
use crate::model::WorkflowNodeType;
use crate::reference::OutputRef;
use crate::validation::ValidatedGraph;

/// Outputs produced during one run of a validated graph
#[derive(Debug)]
pub struct ExecutionContext<'g> {
    graph: &'g ValidatedGraph,
    run_id: RunId,
    produced: HashMap<NodeId, HashMap<String, Value>>,
}

impl<'g> ExecutionContext<'g> {
    pub fn new(graph: &'g ValidatedGraph) -> Self {
        Self::with_run_id(graph, RunId::new())
    }

    pub fn with_run_id(graph: &'g ValidatedGraph, run_id: RunId) -> Self {
        Self {
            graph,
            run_id,
            produced: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &'g ValidatedGraph {
        self.graph
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Record a value produced by a node
    ///
    /// The node must exist and declare an output port with this name. A
    /// second recording of the same output replaces the first.
    pub fn record_output(
        &mut self,
        node_id: &NodeId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ResolveError> {
        let node = self
            .graph
            .find_node(node_id.as_str())
            .ok_or_else(|| ResolveError::UnknownNode(node_id.clone()))?;

        if node.output(name).is_none() {
            return Err(ResolveError::UnknownOutput {
                node: node_id.clone(),
                output: name.to_string(),
            });
        }

        trace!(run_id = %self.run_id, node_id = %node_id, output = name, "Recorded node output");
        self.produced
            .entry(node_id.clone())
            .or_default()
            .insert(name.to_string(), value.into());
        Ok(())
    }

    /// True once the node has recorded at least one output
    pub fn has_produced(&self, node_id: &str) -> bool {
        self.produced.contains_key(node_id)
    }

    /// Resolve a reference to a produced value
    ///
    /// A recorded value wins; otherwise the literal `value` of the declared
    /// port is used.
    pub fn resolve(&self, reference: &OutputRef) -> Result<&Value, ResolveError> {
        let node_id = reference.node_id();
        let node = self
            .graph
            .find_node(node_id.as_str())
            .ok_or_else(|| ResolveError::UnknownNode(node_id.clone()))?;

        let port = node.output(reference.output()).ok_or_else(|| ResolveError::UnknownOutput {
            node: node_id.clone(),
            output: reference.output().to_string(),
        })?;

        if let Some(value) = self
            .produced
            .get(node_id.as_str())
            .and_then(|outputs| outputs.get(reference.output()))
        {
            return Ok(value);
        }

        port.value.as_ref().ok_or_else(|| ResolveError::OutputNotProduced {
            node: node_id.clone(),
            output: reference.output().to_string(),
        })
    }

    /// Parse a raw selector and resolve it
    pub fn resolve_str(&self, raw: &str) -> Result<&Value, ResolveError> {
        let reference = OutputRef::parse(raw)?;
        self.resolve(&reference)
    }

    /// Resolve a node's input port through its value selector, or its literal
    ///
    /// Returns `Ok(None)` when the port carries neither.
    pub fn resolve_input(&self, node_id: &str, input: &str) -> Result<Option<&Value>, ResolveError> {
        let node = self
            .graph
            .find_node(node_id)
            .ok_or_else(|| ResolveError::UnknownNode(NodeId::new(node_id)))?;

        let Some(port) = node.inputs.iter().find(|io| io.name == input) else {
            return Ok(None);
        };

        match &port.value_selector {
            Some(selector) => {
                let reference = OutputRef::new(selector.id.clone(), selector.name.clone());
                self.resolve(&reference).map(Some)
            }
            None => Ok(port.value.as_ref()),
        }
    }

    /// Certificate a deploy node should install
    pub fn deploy_certificate(&self, node_id: &str) -> Result<&Value, ResolveError> {
        let id = NodeId::new(node_id);
        let config = self
            .graph
            .config(node_id)
            .ok_or_else(|| ResolveError::UnknownNode(id.clone()))?;

        let NodeConfig::Deploy(deploy) = config else {
            return Err(ResolveError::UnexpectedNodeType {
                node: id,
                expected: WorkflowNodeType::Deploy.as_str(),
                actual: config.node_type().as_str(),
            });
        };

        let reference = deploy.certificate.as_ref().ok_or(ResolveError::MissingReference {
            node: id,
            field: "certificate",
        })?;

        debug!(
            run_id = %self.run_id,
            node_id = node_id,
            source = %reference,
            "Resolving deploy certificate"
        );
        self.resolve(reference)
    }
}
