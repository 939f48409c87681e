//! Workflow definitions: the authored blueprint for a process
//!
//! A WorkflowDefinition is a directed graph of typed nodes and labeled
//! edges. Definitions are immutable once Active; edits go through
//! [`WorkflowDefinition::new_version`], which produces a fresh Draft.

use crate::{NodeId, PrincipalRef, WorkflowEdge, WorkflowError, WorkflowNode, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a workflow definition (shared across versions).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowDefinitionId(pub String);

impl WorkflowDefinitionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowDefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DefinitionStatus {
    /// Editable; not yet runnable
    #[default]
    Draft,
    /// Validated and runnable; nodes/edges frozen
    Active,
    /// Superseded by a newer Active version; existing instances keep
    /// referencing it
    Deprecated,
}

/// A workflow definition: a versioned, typed process graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Identifier shared by all versions of this workflow
    pub id: WorkflowDefinitionId,
    /// Version number, starting at 1
    pub version: u32,
    /// Human-readable name
    pub name: String,
    /// Description of what this workflow accomplishes
    pub description: String,
    /// Who authored this definition
    pub author: PrincipalRef,
    /// Lifecycle status
    pub status: DefinitionStatus,
    /// The nodes of the graph
    pub nodes: Vec<WorkflowNode>,
    /// The edges of the graph
    pub edges: Vec<WorkflowEdge>,
    /// When this version was created
    pub created_at: DateTime<Utc>,
    /// Metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl WorkflowDefinition {
    /// Create a new Draft definition.
    pub fn new(name: impl Into<String>, author: PrincipalRef) -> Self {
        Self {
            id: WorkflowDefinitionId::generate(),
            version: 1,
            name: name.into(),
            description: String::new(),
            author,
            status: DefinitionStatus::Draft,
            nodes: Vec::new(),
            edges: Vec::new(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add a node to the graph. Rejected once the definition is no
    /// longer a Draft.
    pub fn add_node(&mut self, node: WorkflowNode) -> WorkflowResult<()> {
        self.ensure_draft()?;
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(WorkflowError::DuplicateNodeId(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add an edge to the graph. Both endpoints must exist.
    pub fn add_edge(&mut self, edge: WorkflowEdge) -> WorkflowResult<()> {
        self.ensure_draft()?;
        if !self.nodes.iter().any(|n| n.id == edge.source) {
            return Err(WorkflowError::NodeNotFound(edge.source));
        }
        if !self.nodes.iter().any(|n| n.id == edge.target) {
            return Err(WorkflowError::NodeNotFound(edge.target));
        }
        if self
            .edges
            .iter()
            .any(|e| e.source == edge.source && e.target == edge.target && e.label == edge.label)
        {
            return Err(WorkflowError::DuplicateEdge {
                from: edge.source,
                to: edge.target,
            });
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Clone this definition into a fresh Draft with the version bumped.
    /// This is the only way to "edit" a non-Draft definition.
    pub fn new_version(&self) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next.status = DefinitionStatus::Draft;
        next.created_at = Utc::now();
        next
    }

    // ── Query methods ────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.status == DefinitionStatus::Active
    }

    /// The start node, if one exists.
    pub fn start_node(&self) -> Option<&WorkflowNode> {
        self.nodes
            .iter()
            .find(|n| n.kind == crate::NodeKind::Start)
    }

    /// All end nodes.
    pub fn end_nodes(&self) -> Vec<&WorkflowNode> {
        self.nodes
            .iter()
            .filter(|n| n.kind == crate::NodeKind::End)
            .collect()
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn outgoing_edges(&self, node_id: &NodeId) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| &e.source == node_id).collect()
    }

    pub fn incoming_edges(&self, node_id: &NodeId) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| &e.target == node_id).collect()
    }

    /// The outgoing edge of `node_id` carrying `label`, if any.
    pub fn outgoing_edge_labeled(&self, node_id: &NodeId, label: &str) -> Option<&WorkflowEdge> {
        self.edges
            .iter()
            .find(|e| &e.source == node_id && e.has_label(label))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_draft(&self) -> WorkflowResult<()> {
        if self.status != DefinitionStatus::Draft {
            return Err(WorkflowError::DefinitionFrozen {
                id: self.id.clone(),
                version: self.version,
            });
        }
        Ok(())
    }
}
