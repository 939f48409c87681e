//! Workflow nodes: the typed steps of a process graph
//!
//! Every node carries a kind from a closed vocabulary plus flat optional
//! configuration. Which configuration fields are required for which kind
//! is enforced by the validator, not the constructors; an author may
//! build an incomplete draft and fix it before activation.

use crate::PrincipalRef;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node within a definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of node kinds the engine executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// The entry point of the workflow; transitions immediately
    Start,
    /// A terminal node; the instance completes when one is reached
    End,
    /// A human/system task; waits for an external completion signal
    Process,
    /// A branch point; evaluates ordered conditions against the context
    Decision,
    /// Waits for an approve/reject decision from its assignees
    Approval,
    /// A review step; runtime behavior matches Approval
    Review,
    /// A timed wait; exits only when its timer fires
    Wait,
    /// Fire-and-continue notification dispatch
    Notification,
    /// Side-effecting pass-through that dispatches to an escalation target
    Escalation,
}

impl NodeKind {
    /// Kinds that hold the token and wait for an external signal or timer.
    pub fn is_wait_state(&self) -> bool {
        matches!(
            self,
            Self::Process | Self::Approval | Self::Review | Self::Wait
        )
    }

    /// Kinds the engine passes through without waiting.
    pub fn is_pass_through(&self) -> bool {
        matches!(
            self,
            Self::Start | Self::Decision | Self::Notification | Self::Escalation
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Process => "process",
            Self::Decision => "decision",
            Self::Approval => "approval",
            Self::Review => "review",
            Self::Wait => "wait",
            Self::Notification => "notification",
            Self::Escalation => "escalation",
        };
        write!(f, "{}", s)
    }
}

/// One ordered branch condition on a Decision node.
///
/// The first condition whose predicate evaluates true against the instance
/// context selects the outgoing edge carrying `target_label`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCondition {
    /// Predicate expression (`status == approved`, `score >= 80`, `true`)
    pub predicate: String,
    /// Label of the outgoing edge this branch selects
    pub target_label: String,
}

impl BranchCondition {
    pub fn new(predicate: impl Into<String>, target_label: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            target_label: target_label.into(),
        }
    }
}

/// A node in the workflow graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique identifier within this definition
    pub id: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// Human-readable label
    pub label: String,
    /// Free-text description
    pub description: String,
    /// Assigned principals (Process/Approval/Review)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<PrincipalRef>,
    /// Maximum time this node may remain active before a timeout signal
    /// (Process/Approval), or the wait duration (Wait)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Ordered branch conditions (Decision). An empty list marks an
    /// externally evaluated decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<BranchCondition>,
    /// Message template reference (Notification)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Notification recipients (Notification)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<PrincipalRef>,
    /// Delay before an Escalation node's dispatch is considered overdue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalate_after_secs: Option<u64>,
    /// Escalation target (Escalation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalate_to: Option<PrincipalRef>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(id),
            kind,
            label: label.into(),
            description: String::new(),
            assignees: Vec::new(),
            duration_secs: None,
            conditions: Vec::new(),
            template: None,
            recipients: Vec::new(),
            escalate_after_secs: None,
            escalate_to: None,
        }
    }

    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, "Start", NodeKind::Start)
    }

    pub fn end(id: impl Into<String>) -> Self {
        Self::new(id, "End", NodeKind::End)
    }

    pub fn process(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, NodeKind::Process)
    }

    pub fn decision(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, NodeKind::Decision)
    }

    pub fn approval(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, NodeKind::Approval)
    }

    pub fn review(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, NodeKind::Review)
    }

    pub fn wait(id: impl Into<String>, duration_secs: u64) -> Self {
        let mut node = Self::new(id, "Wait", NodeKind::Wait);
        node.duration_secs = Some(duration_secs);
        node
    }

    pub fn notification(id: impl Into<String>, template: impl Into<String>) -> Self {
        let mut node = Self::new(id, "Notify", NodeKind::Notification);
        node.template = Some(template.into());
        node
    }

    pub fn escalation(id: impl Into<String>, escalate_to: PrincipalRef) -> Self {
        let mut node = Self::new(id, "Escalate", NodeKind::Escalation);
        node.escalate_to = Some(escalate_to);
        node
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_assignee(mut self, principal: PrincipalRef) -> Self {
        self.assignees.push(principal);
        self
    }

    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_condition(
        mut self,
        predicate: impl Into<String>,
        target_label: impl Into<String>,
    ) -> Self {
        self.conditions.push(BranchCondition::new(predicate, target_label));
        self
    }

    pub fn with_recipient(mut self, principal: PrincipalRef) -> Self {
        self.recipients.push(principal);
        self
    }

    pub fn with_escalate_after(mut self, secs: u64) -> Self {
        self.escalate_after_secs = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_constructors() {
        let start = WorkflowNode::start("s");
        assert_eq!(start.kind, NodeKind::Start);
        assert!(start.kind.is_pass_through());
        assert!(!start.kind.is_wait_state());

        let process = WorkflowNode::process("p", "Prepare sample");
        assert_eq!(process.kind, NodeKind::Process);
        assert!(process.kind.is_wait_state());

        let wait = WorkflowNode::wait("w", 3600);
        assert_eq!(wait.duration_secs, Some(3600));

        let escalation = WorkflowNode::escalation("e", PrincipalRef::role("qa-lead"));
        assert_eq!(escalation.escalate_to, Some(PrincipalRef::role("qa-lead")));
        assert!(escalation.kind.is_pass_through());
    }

    #[test]
    fn test_decision_conditions_ordered() {
        let node = WorkflowNode::decision("d", "Approved?")
            .with_condition("status == approved", "yes")
            .with_condition("true", "no");

        assert_eq!(node.conditions.len(), 2);
        assert_eq!(node.conditions[0].target_label, "yes");
        assert_eq!(node.conditions[1].predicate, "true");
    }

    #[test]
    fn test_builders() {
        let node = WorkflowNode::approval("a", "QA sign-off")
            .with_description("Quality sign-off before release")
            .with_assignee(PrincipalRef::role("qa"))
            .with_assignee(PrincipalRef::user("dana"))
            .with_duration(86400);

        assert_eq!(node.assignees.len(), 2);
        assert_eq!(node.duration_secs, Some(86400));
        assert!(!node.description.is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(format!("{}", NodeKind::Approval), "approval");
        assert_eq!(format!("{}", NodeKind::Wait), "wait");
    }
}
