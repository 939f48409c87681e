//! Error types shared across the workflow crates

use crate::{NodeId, WorkflowDefinitionId, WorkflowInstanceId};
use thiserror::Error;

/// Errors raised by definition editing, validation, and execution.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(WorkflowDefinitionId),

    #[error("Workflow definition {id} v{version} is not active")]
    DefinitionNotActive {
        id: WorkflowDefinitionId,
        version: u32,
    },

    #[error("Workflow definition {id} v{version} is frozen and cannot be edited")]
    DefinitionFrozen {
        id: WorkflowDefinitionId,
        version: u32,
    },

    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(WorkflowInstanceId),

    #[error("Instance {instance_id} is already terminal ({status})")]
    InstanceTerminal {
        instance_id: WorkflowInstanceId,
        status: String,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    // Field names avoid `source`, which thiserror reserves for the
    // error's cause chain.
    #[error("Duplicate edge: {from} -> {to}")]
    DuplicateEdge { from: NodeId, to: NodeId },

    #[error("Workflow definition has no Start node")]
    NoStartNode,

    #[error("Node {node_id} has no outgoing edge to follow ({needed})")]
    MissingOutgoingEdge { node_id: NodeId, needed: String },

    #[error("Workflow definition failed validation with {issue_count} issue(s): {summary}")]
    ValidationFailed { issue_count: usize, summary: String },

    #[error("Decision node {node_id} resolved no branch for context {context}")]
    DecisionUnresolved { node_id: NodeId, context: String },

    #[error("Signal does not match the state of node {node_id}: {reason}")]
    SignalMismatch { node_id: NodeId, reason: String },

    #[error("Pass-through chain exceeded {limit} hops at node {node_id}")]
    PassThroughLimit { node_id: NodeId, limit: usize },

    #[error("Storage error: {0}")]
    Store(String),
}

/// Convenience alias used throughout the workflow crates.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
