//! Cross-node output references
//!
//! A node reads data produced by an upstream node through a textual selector
//! of the form `<NodeId>#<OutputName>`, e.g. `apply-1#certificate`. The
//! selector is a weak reference: it is parsed (and its shape checked) when the
//! graph is loaded, but it is only resolved while the workflow runs, because
//! the referenced output does not exist until the upstream node has executed.

use std::fmt;
use std::str::FromStr;

use certflow_common::NodeId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ReferenceError;

/// Separator between node id and output name
pub const REFERENCE_SEPARATOR: char = '#';

/// Typed `<NodeId>#<OutputName>` selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    node_id: NodeId,
    output: String,
}

impl OutputRef {
    pub fn new(node_id: impl Into<NodeId>, output: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            output: output.into(),
        }
    }

    /// Parse a selector string
    ///
    /// Both halves must be non-empty and the output name must not contain
    /// another separator.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let (node_id, output) = trimmed
            .split_once(REFERENCE_SEPARATOR)
            .ok_or_else(|| ReferenceError::MissingSeparator(raw.to_string()))?;

        if node_id.is_empty() {
            return Err(ReferenceError::EmptyNodeId(raw.to_string()));
        }
        if output.is_empty() {
            return Err(ReferenceError::EmptyOutputName(raw.to_string()));
        }
        if output.contains(REFERENCE_SEPARATOR) {
            return Err(ReferenceError::TooManySeparators(raw.to_string()));
        }

        Ok(Self::new(node_id, output))
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

impl FromStr for OutputRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.node_id, REFERENCE_SEPARATOR, self.output)
    }
}

impl Serialize for OutputRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OutputRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
