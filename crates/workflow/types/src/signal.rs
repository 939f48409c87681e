//! Signals delivered to running instances and the outcomes of applying
//! them.
//!
//! Signals are at-least-once: timers may fire twice, clients may retry.
//! The engine absorbs duplicates by checking the occurrence a signal
//! targets against the instance's current position and answering
//! [`AdvanceOutcome::Stale`] when they differ.

use crate::{NodeId, OccurrenceId, PrincipalRef, TimerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The verdict carried by an approval or review signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// An external stimulus addressed at an instance.
///
/// Every variant that targets a wait-state names the occurrence it was
/// issued against, so deliveries that arrive after the token has moved
/// on are recognized as stale rather than misapplied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Signal {
    /// A human verdict on an Approval or Review node.
    ApprovalDecision {
        occurrence_id: OccurrenceId,
        outcome: ApprovalOutcome,
        actor: PrincipalRef,
    },
    /// Completion of the work behind a Process node. The payload is
    /// merged into the instance context before the token advances.
    TaskCompleted {
        occurrence_id: OccurrenceId,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        payload: HashMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        actor: Option<PrincipalRef>,
    },
    /// Resolution of a Decision node that is waiting for inputs (a
    /// Decision with no inline conditions). The label selects the
    /// outgoing edge.
    DecisionInputsReady {
        occurrence_id: OccurrenceId,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        actor: Option<PrincipalRef>,
    },
    /// A scheduled timer expired. Delivered at least once.
    TimerFired {
        timer_id: TimerId,
        occurrence_id: OccurrenceId,
    },
}

impl Signal {
    /// The occurrence this signal was issued against.
    pub fn occurrence_id(&self) -> &OccurrenceId {
        match self {
            Self::ApprovalDecision { occurrence_id, .. }
            | Self::TaskCompleted { occurrence_id, .. }
            | Self::DecisionInputsReady { occurrence_id, .. }
            | Self::TimerFired { occurrence_id, .. } => occurrence_id,
        }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApprovalDecision { .. } => "approval-decision",
            Self::TaskCompleted { .. } => "task-completed",
            Self::DecisionInputsReady { .. } => "decision-inputs-ready",
            Self::TimerFired { .. } => "timer-fired",
        }
    }
}

/// Why a signal was discarded without effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleReason {
    /// The instance already reached a terminal status.
    InstanceTerminal,
    /// The token has moved past the occurrence the signal names.
    OccurrencePassed,
    /// The timer was cancelled before its firing was processed.
    TimerCancelled,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstanceTerminal => write!(f, "instance-terminal"),
            Self::OccurrencePassed => write!(f, "occurrence-passed"),
            Self::TimerCancelled => write!(f, "timer-cancelled"),
        }
    }
}

/// Result of delivering a signal to an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceOutcome {
    /// The signal moved the token. `entered` is the wait-state or
    /// terminal position the instance settled at, None when the
    /// instance finished without an active node.
    Applied {
        status: crate::InstanceStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        entered: Option<NodeId>,
    },
    /// The signal was recognized as a duplicate or late delivery and
    /// dropped without changing the instance.
    Stale { reason: StaleReason },
}

impl AdvanceOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_occurrence_and_kind() {
        let occ = OccurrenceId::new("occ-1");
        let sig = Signal::ApprovalDecision {
            occurrence_id: occ.clone(),
            outcome: ApprovalOutcome::Rejected,
            actor: PrincipalRef::user("qa-lead"),
        };
        assert_eq!(sig.occurrence_id(), &occ);
        assert_eq!(sig.kind(), "approval-decision");

        let sig = Signal::TimerFired {
            timer_id: TimerId::new("t-1"),
            occurrence_id: occ.clone(),
        };
        assert_eq!(sig.kind(), "timer-fired");
    }

    #[test]
    fn test_outcome_predicates() {
        let applied = AdvanceOutcome::Applied {
            status: crate::InstanceStatus::Running,
            entered: Some(NodeId::new("review")),
        };
        assert!(applied.is_applied());
        assert!(!applied.is_stale());

        let stale = AdvanceOutcome::Stale {
            reason: StaleReason::OccurrencePassed,
        };
        assert!(stale.is_stale());
    }

    #[test]
    fn test_approval_outcome_display() {
        assert_eq!(ApprovalOutcome::Approved.to_string(), "approved");
        assert_eq!(ApprovalOutcome::Rejected.to_string(), "rejected");
    }

    #[test]
    fn test_signal_serde() {
        let sig = Signal::DecisionInputsReady {
            occurrence_id: OccurrenceId::new("occ-2"),
            label: "retest".to_string(),
            actor: None,
        };
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signal = serde_json::from_str(&json).unwrap();
        match back {
            Signal::DecisionInputsReady { label, .. } => assert_eq!(label, "retest"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
