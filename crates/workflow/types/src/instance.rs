//! Workflow instances: running executions of definitions
//!
//! An instance carries exactly one token, the active [`NodeOccurrence`].
//! Every activation mints a fresh occurrence id, which is what makes
//! stale-signal detection possible: a signal naming an occurrence the
//! instance has already left is a no-op.
//!
//! The history log is append-only and sequence-numbered. It is the audit
//! record for regulated processes and the source of truth on recovery.

use crate::{NodeId, PrincipalRef, WorkflowDefinitionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a workflow instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

impl WorkflowInstanceId {
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

impl std::fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one activation of a node within an instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccurrenceId(pub String);

impl OccurrenceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a scheduled timer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub String);

impl TimerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Instance state ───────────────────────────────────────────────────

/// Lifecycle status of a workflow instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InstanceStatus {
    /// Actively executing (or waiting at a node)
    #[default]
    Running,
    /// Reached an End node
    Completed,
    /// Explicitly terminated by an operator
    Terminated,
    /// Failed (unresolved decision, rejection with no path, timeout)
    Failed,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One activation of a node: the instance's token position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOccurrence {
    /// Fresh per activation; stale signals are detected by comparing this
    pub occurrence_id: OccurrenceId,
    /// The node this occurrence instantiates
    pub node_id: NodeId,
    /// When the node was activated
    pub activated_at: DateTime<Utc>,
}

/// What caused a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// Pass-through advancement requiring no external signal
    Automatic,
    /// A Decision branch was selected
    DecisionEvaluated { label: String },
    /// An Approval/Review was approved
    ApprovalGranted,
    /// An Approval/Review was rejected
    ApprovalRejected,
    /// A duration timer expired
    Timeout,
    /// An Escalation node dispatched and passed through
    Escalation,
    /// An external task-completion or payload signal
    ExternalSignal,
}

impl std::fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automatic => write!(f, "automatic"),
            Self::DecisionEvaluated { label } => write!(f, "decision-evaluated:{}", label),
            Self::ApprovalGranted => write!(f, "approval-granted"),
            Self::ApprovalRejected => write!(f, "approval-rejected"),
            Self::Timeout => write!(f, "timeout"),
            Self::Escalation => write!(f, "escalation"),
            Self::ExternalSignal => write!(f, "external-signal"),
        }
    }
}

/// One entry in an instance's append-only history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Monotonically increasing per instance
    pub sequence: u64,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Node the token left (None for instance-level events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NodeId>,
    /// Node the token entered (None when the instance stopped here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NodeId>,
    /// Why the transition happened
    pub cause: TransitionCause,
    /// Who caused it, when human-caused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<PrincipalRef>,
    /// Free-text detail (evaluated inputs, failure reasons)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// A non-fatal problem attached to an instance for operator attention,
/// e.g. a failed assignment notification that should be retried manually.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstanceWarning {
    pub timestamp: DateTime<Utc>,
    pub node_id: NodeId,
    pub message: String,
}

/// A running (or finished) execution of a workflow definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique instance identifier
    pub id: WorkflowInstanceId,
    /// The definition this instance was created from
    pub definition_id: WorkflowDefinitionId,
    /// The definition version this instance is bound to
    pub definition_version: u32,
    /// Lifecycle status
    pub status: InstanceStatus,
    /// The single active node occurrence (None once terminal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<NodeOccurrence>,
    /// Data context evaluated by Decision predicates; external signals
    /// may merge updates into it
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    /// Append-only transition history
    pub history: Vec<TransitionRecord>,
    /// Pending timers and the occurrence each belongs to
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pending_timers: HashMap<TimerId, OccurrenceId>,
    /// Operator-facing warnings (gateway dispatch failures)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<InstanceWarning>,
    /// When the instance was created
    pub created_at: DateTime<Utc>,
    /// When the instance was last updated
    pub updated_at: DateTime<Utc>,
    /// When the instance reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Create a new Running instance bound to `(definition_id, version)`.
    pub fn new(
        definition_id: WorkflowDefinitionId,
        definition_version: u32,
        context: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowInstanceId::generate(),
            definition_id,
            definition_version,
            status: InstanceStatus::Running,
            active: None,
            context,
            history: Vec::new(),
            pending_timers: HashMap::new(),
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    // ── Token movement ───────────────────────────────────────────────

    /// Activate a node, minting a fresh occurrence. Returns the new
    /// occurrence id.
    pub fn enter_node(&mut self, node_id: NodeId) -> OccurrenceId {
        let occurrence = NodeOccurrence {
            occurrence_id: OccurrenceId::generate(),
            node_id,
            activated_at: Utc::now(),
        };
        let id = occurrence.occurrence_id.clone();
        self.active = Some(occurrence);
        self.updated_at = Utc::now();
        id
    }

    /// Drop the token without entering another node (terminal paths).
    pub fn clear_active(&mut self) {
        self.active = None;
        self.updated_at = Utc::now();
    }

    /// The currently active occurrence, if the instance holds its token.
    pub fn active_occurrence(&self) -> Option<&NodeOccurrence> {
        self.active.as_ref()
    }

    /// Check whether `occurrence_id` is the instance's current position.
    pub fn is_current_occurrence(&self, occurrence_id: &OccurrenceId) -> bool {
        self.active
            .as_ref()
            .map(|o| &o.occurrence_id == occurrence_id)
            .unwrap_or(false)
    }

    // ── History ──────────────────────────────────────────────────────

    /// Append a transition record. Sequence numbers are assigned here so
    /// the log stays gapless and totally ordered per instance.
    pub fn record(
        &mut self,
        from: Option<NodeId>,
        to: Option<NodeId>,
        cause: TransitionCause,
        actor: Option<PrincipalRef>,
        detail: impl Into<String>,
    ) {
        self.history.push(TransitionRecord {
            sequence: self.history.len() as u64,
            timestamp: Utc::now(),
            from,
            to,
            cause,
            actor,
            detail: detail.into(),
        });
        self.updated_at = Utc::now();
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn complete(&mut self) {
        self.status = InstanceStatus::Completed;
        self.active = None;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self) {
        self.status = InstanceStatus::Failed;
        self.active = None;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn terminate(&mut self) {
        self.status = InstanceStatus::Terminated;
        self.active = None;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Register a pending timer for an occurrence.
    pub fn register_timer(&mut self, timer_id: TimerId, occurrence_id: OccurrenceId) {
        self.pending_timers.insert(timer_id, occurrence_id);
        self.updated_at = Utc::now();
    }

    /// Remove a timer; returns the occurrence it belonged to, if known.
    pub fn clear_timer(&mut self, timer_id: &TimerId) -> Option<OccurrenceId> {
        let occ = self.pending_timers.remove(timer_id);
        self.updated_at = Utc::now();
        occ
    }

    /// Drain all pending timer ids (used by termination).
    pub fn drain_timers(&mut self) -> Vec<TimerId> {
        let ids: Vec<TimerId> = self.pending_timers.keys().cloned().collect();
        self.pending_timers.clear();
        self.updated_at = Utc::now();
        ids
    }

    // ── Context & warnings ───────────────────────────────────────────

    /// Merge a payload into the data context, overwriting existing keys.
    pub fn merge_context(&mut self, payload: &HashMap<String, String>) {
        for (k, v) in payload {
            self.context.insert(k.clone(), v.clone());
        }
        self.updated_at = Utc::now();
    }

    pub fn add_warning(&mut self, node_id: NodeId, message: impl Into<String>) {
        self.warnings.push(InstanceWarning {
            timestamp: Utc::now(),
            node_id,
            message: message.into(),
        });
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_instance() -> WorkflowInstance {
        WorkflowInstance::new(
            WorkflowDefinitionId::new("def-1"),
            1,
            HashMap::new(),
        )
    }

    #[test]
    fn test_new_instance() {
        let inst = make_instance();
        assert_eq!(inst.status, InstanceStatus::Running);
        assert!(inst.is_running());
        assert!(!inst.is_terminal());
        assert!(inst.active.is_none());
        assert!(inst.history.is_empty());
    }

    #[test]
    fn test_enter_node_mints_occurrences() {
        let mut inst = make_instance();
        let occ1 = inst.enter_node(NodeId::new("review"));
        assert!(inst.is_current_occurrence(&occ1));

        // Re-entering the same node is a different occurrence.
        let occ2 = inst.enter_node(NodeId::new("review"));
        assert_ne!(occ1, occ2);
        assert!(!inst.is_current_occurrence(&occ1));
        assert!(inst.is_current_occurrence(&occ2));
    }

    #[test]
    fn test_history_sequence() {
        let mut inst = make_instance();
        inst.record(
            None,
            Some(NodeId::new("start")),
            TransitionCause::Automatic,
            None,
            "",
        );
        inst.record(
            Some(NodeId::new("start")),
            Some(NodeId::new("review")),
            TransitionCause::Automatic,
            None,
            "",
        );
        inst.record(
            Some(NodeId::new("review")),
            Some(NodeId::new("end")),
            TransitionCause::ApprovalGranted,
            Some(PrincipalRef::user("dana")),
            "",
        );

        for (i, rec) in inst.history.iter().enumerate() {
            assert_eq!(rec.sequence, i as u64);
        }
        assert_eq!(inst.history[2].actor, Some(PrincipalRef::user("dana")));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut inst = make_instance();
        inst.enter_node(NodeId::new("task"));

        inst.complete();
        assert_eq!(inst.status, InstanceStatus::Completed);
        assert!(inst.is_terminal());
        assert!(inst.active.is_none());
        assert!(inst.completed_at.is_some());

        let mut inst = make_instance();
        inst.fail();
        assert_eq!(inst.status, InstanceStatus::Failed);

        let mut inst = make_instance();
        inst.terminate();
        assert_eq!(inst.status, InstanceStatus::Terminated);
    }

    #[test]
    fn test_timers() {
        let mut inst = make_instance();
        let occ = inst.enter_node(NodeId::new("wait"));
        let t1 = TimerId::generate();
        let t2 = TimerId::generate();
        inst.register_timer(t1.clone(), occ.clone());
        inst.register_timer(t2.clone(), occ.clone());

        assert_eq!(inst.clear_timer(&t1), Some(occ));
        assert_eq!(inst.clear_timer(&t1), None);
        assert_eq!(inst.pending_timers.len(), 1);

        let drained = inst.drain_timers();
        assert_eq!(drained, vec![t2]);
        assert!(inst.pending_timers.is_empty());
    }

    #[test]
    fn test_merge_context() {
        let mut inst = make_instance();
        inst.context.insert("status".into(), "pending".into());

        let mut payload = HashMap::new();
        payload.insert("status".to_string(), "approved".to_string());
        payload.insert("score".to_string(), "92".to_string());
        inst.merge_context(&payload);

        assert_eq!(inst.context.get("status").unwrap(), "approved");
        assert_eq!(inst.context.get("score").unwrap(), "92");
    }

    #[test]
    fn test_warnings() {
        let mut inst = make_instance();
        inst.add_warning(NodeId::new("appr"), "assignment notification failed");
        assert_eq!(inst.warnings.len(), 1);
        assert_eq!(inst.warnings[0].node_id, NodeId::new("appr"));
    }

    #[test]
    fn test_cause_display() {
        assert_eq!(format!("{}", TransitionCause::Timeout), "timeout");
        assert_eq!(
            format!(
                "{}",
                TransitionCause::DecisionEvaluated { label: "no".into() }
            ),
            "decision-evaluated:no"
        );
    }

    #[test]
    fn test_instance_serde_round_trip() {
        let mut inst = make_instance();
        let occ = inst.enter_node(NodeId::new("wait"));
        inst.register_timer(TimerId::generate(), occ);
        inst.record(
            None,
            Some(NodeId::new("wait")),
            TransitionCause::Automatic,
            None,
            "entered",
        );

        let json = serde_json::to_string(&inst).unwrap();
        let back: WorkflowInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, inst.id);
        assert_eq!(back.history.len(), 1);
        assert_eq!(back.pending_timers.len(), 1);
    }
}
