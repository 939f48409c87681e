//! The workflow engine: signal delivery and token movement
//!
//! All mutation of an instance goes through [`WorkflowEngine::start`],
//! [`WorkflowEngine::signal`], or [`WorkflowEngine::terminate`]. Each
//! acquires the instance's lock, loads state from the store, applies
//! the change, and persists before returning, so signal application is
//! serialized per instance and effectively exactly-once: duplicate or
//! late deliveries are answered with [`AdvanceOutcome::Stale`] instead
//! of moving the token twice.
//!
//! Pass-through nodes (Start, Decision, Notification, Escalation) are
//! consumed inside the same application; the token only rests on
//! wait-state nodes or a terminal status.

use crate::{
    ConditionEvaluator, DefinitionRegistry, EventGateway, InstanceStore, NotificationRequest,
    PrincipalResolver, TimerRecord,
};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use limsflow_types::{
    labels, AdvanceOutcome, ApprovalOutcome, NodeKind, PrincipalRef, Signal, StaleReason,
    TimerId, TransitionCause, TransitionRecord, WorkflowDefinition, WorkflowDefinitionId,
    WorkflowEdge, WorkflowError, WorkflowInstance, WorkflowInstanceId, WorkflowNode,
    WorkflowResult,
};
use limsflow_validate::ValidationReport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Tunables for the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on consecutive pass-through hops per signal. A
    /// guard against definitions that slipped past validation.
    pub max_pass_through_hops: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pass_through_hops: 64,
        }
    }
}

/// Counts reported by [`WorkflowEngine::recover`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Timer records dropped because their instance or occurrence is gone
    pub stale_timers_dropped: usize,
    /// Timers already due that were fired during recovery
    pub due_timers_fired: usize,
    /// Timers left pending for the scheduler
    pub timers_pending: usize,
}

/// Coordinates definitions, instances, timers, and notifications.
/// The engine tracks where each token is; it never performs the work
/// a node represents.
pub struct WorkflowEngine {
    registry: RwLock<DefinitionRegistry>,
    store: Arc<dyn InstanceStore>,
    gateway: Arc<dyn EventGateway>,
    resolver: Arc<dyn PrincipalResolver>,
    evaluator: ConditionEvaluator,
    /// Per-instance locks serializing signal application
    locks: DashMap<WorkflowInstanceId, Arc<Mutex<()>>>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        gateway: Arc<dyn EventGateway>,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        Self {
            registry: RwLock::new(DefinitionRegistry::new()),
            store,
            gateway,
            resolver,
            evaluator: ConditionEvaluator::new(),
            locks: DashMap::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    // ── Definition management ────────────────────────────────────────

    pub async fn register_definition(&self, definition: WorkflowDefinition) -> WorkflowResult<()> {
        self.registry.write().await.register(definition)
    }

    /// Validate and activate a definition version. See
    /// [`DefinitionRegistry::activate`].
    pub async fn activate_definition(
        &self,
        id: &WorkflowDefinitionId,
        version: u32,
    ) -> WorkflowResult<ValidationReport> {
        self.registry.write().await.activate(id, version)
    }

    pub async fn get_definition(
        &self,
        id: &WorkflowDefinitionId,
        version: u32,
    ) -> WorkflowResult<WorkflowDefinition> {
        Ok(self.registry.read().await.get(id, version)?.clone())
    }

    // ── Instance lifecycle ───────────────────────────────────────────

    /// Start an instance of the Active version of a definition.
    ///
    /// The token enters the Start node and advances through any
    /// pass-through chain before this returns, so the caller observes
    /// the instance already resting at its first wait-state (or
    /// already terminal, for degenerate definitions).
    pub async fn start(
        &self,
        definition_id: &WorkflowDefinitionId,
        initiator: PrincipalRef,
        context: HashMap<String, String>,
    ) -> WorkflowResult<WorkflowInstanceId> {
        let definition = {
            let registry = self.registry.read().await;
            registry.get_active(definition_id)?.clone()
        };

        let start_node = definition
            .start_node()
            .ok_or(WorkflowError::NoStartNode)?
            .id
            .clone();

        let mut instance =
            WorkflowInstance::new(definition.id.clone(), definition.version, context);
        let instance_id = instance.id.clone();

        let lock = self.lock_for(&instance_id);
        let _guard = lock.lock().await;

        instance.record(
            None,
            Some(start_node.clone()),
            TransitionCause::Automatic,
            Some(initiator),
            "instance started",
        );
        instance.enter_node(start_node);

        let mut effects = Effects::default();
        self.settle(&mut instance, &definition, &mut effects).await?;
        self.persist(&instance, effects).await?;

        tracing::info!(
            instance_id = %instance_id,
            definition_id = %definition_id,
            version = definition.version,
            status = ?instance.status,
            "Workflow instance started"
        );
        Ok(instance_id)
    }

    /// Deliver a signal to an instance.
    ///
    /// Application is serialized per instance. Signals that name an
    /// occurrence the instance has left, or arrive after the instance
    /// became terminal, are answered `Stale` and change nothing.
    pub async fn signal(
        &self,
        instance_id: &WorkflowInstanceId,
        signal: Signal,
    ) -> WorkflowResult<AdvanceOutcome> {
        let lock = self.lock_for(instance_id);
        let _guard = lock.lock().await;

        let mut instance = self
            .store
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| WorkflowError::InstanceNotFound(instance_id.clone()))?;

        if instance.is_terminal() {
            self.discard_fired_timer(&signal).await?;
            return Ok(AdvanceOutcome::Stale {
                reason: StaleReason::InstanceTerminal,
            });
        }

        if !instance.is_current_occurrence(signal.occurrence_id()) {
            self.discard_fired_timer(&signal).await?;
            tracing::debug!(
                instance_id = %instance_id,
                signal = signal.kind(),
                "Stale signal ignored"
            );
            return Ok(AdvanceOutcome::Stale {
                reason: StaleReason::OccurrencePassed,
            });
        }

        // A fired timer must still be registered on the instance;
        // cancellation may have raced its delivery.
        if let Signal::TimerFired { timer_id, .. } = &signal {
            if !instance.pending_timers.contains_key(timer_id) {
                self.store.remove_timer(timer_id).await?;
                return Ok(AdvanceOutcome::Stale {
                    reason: StaleReason::TimerCancelled,
                });
            }
        }

        let definition = {
            let registry = self.registry.read().await;
            registry
                .get(&instance.definition_id, instance.definition_version)?
                .clone()
        };

        let node = self.current_node(&instance, &definition)?.clone();
        let mut effects = Effects::default();

        match signal {
            Signal::ApprovalDecision { outcome, actor, .. } => {
                self.apply_approval(&mut instance, &definition, &node, outcome, actor, &mut effects)?;
            }
            Signal::TaskCompleted { payload, actor, .. } => {
                if node.kind != NodeKind::Process {
                    return Err(WorkflowError::SignalMismatch {
                        node_id: node.id.clone(),
                        reason: format!("task completion sent to a {} node", node.kind),
                    });
                }
                instance.merge_context(&payload);
                let edge = self.default_edge(&definition, &node)?.clone();
                self.transition(
                    &mut instance,
                    &edge,
                    TransitionCause::ExternalSignal,
                    actor,
                    "",
                    &mut effects,
                );
            }
            Signal::DecisionInputsReady { label, actor, .. } => {
                if node.kind != NodeKind::Decision || !node.conditions.is_empty() {
                    return Err(WorkflowError::SignalMismatch {
                        node_id: node.id.clone(),
                        reason: "node is not a Decision awaiting external inputs".into(),
                    });
                }
                let edge = definition
                    .outgoing_edge_labeled(&node.id, &label)
                    .ok_or_else(|| WorkflowError::MissingOutgoingEdge {
                        node_id: node.id.clone(),
                        needed: label.clone(),
                    })?
                    .clone();
                self.transition(
                    &mut instance,
                    &edge,
                    TransitionCause::DecisionEvaluated { label },
                    actor,
                    "",
                    &mut effects,
                );
            }
            Signal::TimerFired { timer_id, .. } => {
                instance.clear_timer(&timer_id);
                effects.removed_timers.push(timer_id);
                self.apply_timeout(&mut instance, &definition, &node, &mut effects)?;
            }
        }

        self.settle(&mut instance, &definition, &mut effects).await?;
        self.persist(&instance, effects).await?;

        let entered = instance
            .active_occurrence()
            .map(|occurrence| occurrence.node_id.clone());
        tracing::info!(
            instance_id = %instance_id,
            status = ?instance.status,
            entered = ?entered,
            "Signal applied"
        );
        Ok(AdvanceOutcome::Applied {
            status: instance.status,
            entered,
        })
    }

    /// Terminate a running instance, cancelling its pending timers.
    pub async fn terminate(
        &self,
        instance_id: &WorkflowInstanceId,
        actor: PrincipalRef,
        reason: impl Into<String>,
    ) -> WorkflowResult<()> {
        let lock = self.lock_for(instance_id);
        let _guard = lock.lock().await;

        let mut instance = self
            .store
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| WorkflowError::InstanceNotFound(instance_id.clone()))?;

        if instance.is_terminal() {
            return Err(WorkflowError::InstanceTerminal {
                instance_id: instance_id.clone(),
                status: format!("{:?}", instance.status),
            });
        }

        let from = instance
            .active_occurrence()
            .map(|occurrence| occurrence.node_id.clone());
        instance.record(
            from,
            None,
            TransitionCause::ExternalSignal,
            Some(actor),
            reason,
        );

        let effects = Effects {
            removed_timers: instance.drain_timers(),
            ..Effects::default()
        };
        instance.terminate();
        self.persist(&instance, effects).await?;

        tracing::info!(instance_id = %instance_id, "Workflow instance terminated");
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn get_instance(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> WorkflowResult<WorkflowInstance> {
        self.store
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| WorkflowError::InstanceNotFound(instance_id.clone()))
    }

    pub async fn get_history(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> WorkflowResult<Vec<TransitionRecord>> {
        Ok(self.get_instance(instance_id).await?.history)
    }

    pub async fn list_running(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        self.store.list_running().await
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Fire every due timer. Returns how many timers were consumed.
    /// Safe to call concurrently with live signals: duplicates collapse
    /// into `Stale` outcomes.
    pub async fn sweep_timers(&self) -> WorkflowResult<usize> {
        let due = self.store.due_timers(Utc::now()).await?;
        let mut fired = 0;
        for timer in due {
            let signal = Signal::TimerFired {
                timer_id: timer.id.clone(),
                occurrence_id: timer.occurrence_id.clone(),
            };
            match self.signal(&timer.instance_id, signal).await {
                Ok(_) => fired += 1,
                Err(WorkflowError::InstanceNotFound(_)) => {
                    // Orphaned record; the instance is gone.
                    self.store.remove_timer(&timer.id).await?;
                }
                Err(err) => {
                    tracing::warn!(
                        instance_id = %timer.instance_id,
                        timer_id = %timer.id,
                        error = %err,
                        "Timer firing failed; will retry next sweep"
                    );
                }
            }
        }
        Ok(fired)
    }

    /// Reconcile durable timers after a restart: drop records whose
    /// instance or occurrence no longer exists, fire the ones already
    /// due, and leave the rest for the scheduler.
    pub async fn recover(&self) -> WorkflowResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for timer in self.store.all_timers().await? {
            let instance = self.store.load_instance(&timer.instance_id).await?;
            let live = instance
                .map(|i| i.is_running() && i.is_current_occurrence(&timer.occurrence_id))
                .unwrap_or(false);
            if !live {
                self.store.remove_timer(&timer.id).await?;
                report.stale_timers_dropped += 1;
                continue;
            }
            if timer.is_due(Utc::now()) {
                let signal = Signal::TimerFired {
                    timer_id: timer.id.clone(),
                    occurrence_id: timer.occurrence_id.clone(),
                };
                self.signal(&timer.instance_id, signal).await?;
                report.due_timers_fired += 1;
            } else {
                report.timers_pending += 1;
            }
        }
        tracing::info!(
            dropped = report.stale_timers_dropped,
            fired = report.due_timers_fired,
            pending = report.timers_pending,
            "Timer recovery complete"
        );
        Ok(report)
    }

    // ── Signal application internals ─────────────────────────────────

    fn apply_approval(
        &self,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        node: &WorkflowNode,
        outcome: ApprovalOutcome,
        actor: PrincipalRef,
        effects: &mut Effects,
    ) -> WorkflowResult<()> {
        if !matches!(node.kind, NodeKind::Approval | NodeKind::Review) {
            return Err(WorkflowError::SignalMismatch {
                node_id: node.id.clone(),
                reason: format!("approval decision sent to a {} node", node.kind),
            });
        }

        match outcome {
            ApprovalOutcome::Approved => {
                let edge = definition
                    .outgoing_edge_labeled(&node.id, labels::APPROVED)
                    .map(Ok)
                    .unwrap_or_else(|| self.default_edge(definition, node))?
                    .clone();
                self.transition(
                    instance,
                    &edge,
                    TransitionCause::ApprovalGranted,
                    Some(actor),
                    "",
                    effects,
                );
            }
            ApprovalOutcome::Rejected => {
                match definition.outgoing_edge_labeled(&node.id, labels::REJECTED) {
                    Some(edge) => {
                        let edge = edge.clone();
                        self.transition(
                            instance,
                            &edge,
                            TransitionCause::ApprovalRejected,
                            Some(actor),
                            "",
                            effects,
                        );
                    }
                    None => {
                        // No rejection path authored: rejection is final.
                        self.fail_instance(
                            instance,
                            node,
                            TransitionCause::ApprovalRejected,
                            Some(actor),
                            "rejected with no rejection path",
                            effects,
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Timeout policy: a Wait node's timer is its normal completion;
    /// for overdue Approval/Review/Process nodes an `escalate` edge is
    /// followed when authored, otherwise the instance fails.
    fn apply_timeout(
        &self,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        node: &WorkflowNode,
        effects: &mut Effects,
    ) -> WorkflowResult<()> {
        if node.kind == NodeKind::Wait {
            let edge = self.default_edge(definition, node)?.clone();
            self.transition(
                instance,
                &edge,
                TransitionCause::Timeout,
                None,
                "wait duration elapsed",
                effects,
            );
            return Ok(());
        }

        match definition.outgoing_edge_labeled(&node.id, labels::ESCALATE) {
            Some(edge) => {
                let edge = edge.clone();
                self.transition(
                    instance,
                    &edge,
                    TransitionCause::Timeout,
                    None,
                    "deadline exceeded",
                    effects,
                );
            }
            None => {
                self.fail_instance(
                    instance,
                    node,
                    TransitionCause::Timeout,
                    None,
                    "deadline exceeded with no escalation path",
                    effects,
                );
            }
        }
        Ok(())
    }

    /// Consume pass-through nodes until the token rests on a wait-state
    /// node or the instance becomes terminal. Wait-state entry arms
    /// timers and dispatches assignment notifications.
    async fn settle(
        &self,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        effects: &mut Effects,
    ) -> WorkflowResult<()> {
        for _ in 0..self.config.max_pass_through_hops {
            let Some(occurrence) = instance.active_occurrence() else {
                return Ok(());
            };
            let node = definition
                .get_node(&occurrence.node_id)
                .ok_or_else(|| WorkflowError::NodeNotFound(occurrence.node_id.clone()))?
                .clone();

            match node.kind {
                NodeKind::End => {
                    let removed = instance.drain_timers();
                    effects.removed_timers.extend(removed);
                    instance.record(
                        Some(node.id.clone()),
                        None,
                        TransitionCause::Automatic,
                        None,
                        "instance completed",
                    );
                    instance.complete();
                    return Ok(());
                }
                NodeKind::Start => {
                    let edge = self.default_edge(definition, &node)?.clone();
                    self.transition(
                        instance,
                        &edge,
                        TransitionCause::Automatic,
                        None,
                        "",
                        effects,
                    );
                }
                NodeKind::Decision => {
                    if node.conditions.is_empty() {
                        // Externally resolved Decision: wait for a
                        // DecisionInputsReady signal.
                        return Ok(());
                    }
                    match self.evaluator.select_branch(&node, &instance.context) {
                        Some(label) => {
                            let label = label.to_string();
                            let edge = definition
                                .outgoing_edge_labeled(&node.id, &label)
                                .ok_or_else(|| WorkflowError::MissingOutgoingEdge {
                                    node_id: node.id.clone(),
                                    needed: label.clone(),
                                })?
                                .clone();
                            self.transition(
                                instance,
                                &edge,
                                TransitionCause::DecisionEvaluated { label },
                                None,
                                "",
                                effects,
                            );
                        }
                        None => {
                            let context = serde_json::to_string(&instance.context)
                                .unwrap_or_else(|_| "<unprintable>".into());
                            let cause = WorkflowError::DecisionUnresolved {
                                node_id: node.id.clone(),
                                context,
                            };
                            tracing::warn!(
                                instance_id = %instance.id,
                                node_id = %node.id,
                                error = %cause,
                                "Decision resolved no branch"
                            );
                            self.fail_instance(
                                instance,
                                &node,
                                TransitionCause::Automatic,
                                None,
                                cause.to_string(),
                                effects,
                            );
                            return Ok(());
                        }
                    }
                }
                NodeKind::Notification => {
                    let template = node
                        .template
                        .clone()
                        .unwrap_or_else(|| "notification".to_string());
                    self.dispatch(instance, &node, node.recipients.clone(), template)
                        .await;
                    let edge = self.default_edge(definition, &node)?.clone();
                    self.transition(
                        instance,
                        &edge,
                        TransitionCause::Automatic,
                        None,
                        "",
                        effects,
                    );
                }
                NodeKind::Escalation => {
                    let recipients: Vec<PrincipalRef> =
                        node.escalate_to.iter().cloned().collect();
                    self.dispatch(instance, &node, recipients, "escalation".to_string())
                        .await;
                    let edge = self.default_edge(definition, &node)?.clone();
                    self.transition(
                        instance,
                        &edge,
                        TransitionCause::Escalation,
                        None,
                        "",
                        effects,
                    );
                }
                NodeKind::Process | NodeKind::Approval | NodeKind::Review | NodeKind::Wait => {
                    self.enter_wait_state(instance, &node, effects).await;
                    return Ok(());
                }
            }
        }

        tracing::error!(
            instance_id = %instance.id,
            limit = self.config.max_pass_through_hops,
            "Pass-through hop limit exceeded"
        );
        if let Some(occurrence) = instance.active_occurrence() {
            let node_id = occurrence.node_id.clone();
            let cause = WorkflowError::PassThroughLimit {
                node_id: node_id.clone(),
                limit: self.config.max_pass_through_hops,
            };
            instance.record(
                Some(node_id),
                None,
                TransitionCause::Automatic,
                None,
                cause.to_string(),
            );
        }
        let removed = instance.drain_timers();
        effects.removed_timers.extend(removed);
        instance.fail();
        Ok(())
    }

    /// Arm the node's timer (if it carries a duration) and notify its
    /// assignees. Called exactly once per wait-state entry.
    async fn enter_wait_state(
        &self,
        instance: &mut WorkflowInstance,
        node: &WorkflowNode,
        effects: &mut Effects,
    ) {
        let occurrence_id = instance
            .active_occurrence()
            .map(|occurrence| occurrence.occurrence_id.clone());
        if let (Some(occurrence_id), Some(secs)) =
            (occurrence_id, node.duration_secs.filter(|secs| *secs > 0))
        {
            let timer = TimerRecord {
                id: TimerId::generate(),
                instance_id: instance.id.clone(),
                occurrence_id,
                fire_at: Utc::now() + Duration::seconds(secs as i64),
            };
            instance.register_timer(timer.id.clone(), timer.occurrence_id.clone());
            effects.new_timers.push(timer);
        }

        if matches!(node.kind, NodeKind::Approval | NodeKind::Review | NodeKind::Process)
            && !node.assignees.is_empty()
        {
            let template = node
                .template
                .clone()
                .unwrap_or_else(|| "assignment".to_string());
            self.dispatch(instance, node, node.assignees.clone(), template)
                .await;
        }
    }

    /// Resolve recipients and hand the notification to the gateway.
    /// Delivery failure becomes an instance warning, never a workflow
    /// failure.
    async fn dispatch(
        &self,
        instance: &mut WorkflowInstance,
        node: &WorkflowNode,
        recipients: Vec<PrincipalRef>,
        template: String,
    ) {
        let mut resolved = Vec::new();
        for principal in &recipients {
            for user in self.resolver.resolve(principal).await {
                resolved.push(PrincipalRef::User(user.0));
            }
        }

        let request = NotificationRequest {
            recipients: resolved,
            template,
            context: instance.context.clone(),
        };
        if let Err(err) = self.gateway.notify(request).await {
            tracing::warn!(
                instance_id = %instance.id,
                node_id = %node.id,
                error = %err,
                "Notification dispatch failed"
            );
            instance.add_warning(node.id.clone(), format!("notification failed: {}", err));
        }
    }

    /// Move the token across an edge: cancel timers armed for the
    /// departing occurrence, record the transition, enter the target.
    fn transition(
        &self,
        instance: &mut WorkflowInstance,
        edge: &WorkflowEdge,
        cause: TransitionCause,
        actor: Option<PrincipalRef>,
        detail: impl Into<String>,
        effects: &mut Effects,
    ) {
        if let Some(occurrence) = instance.active_occurrence() {
            let departing = occurrence.occurrence_id.clone();
            let obsolete: Vec<TimerId> = instance
                .pending_timers
                .iter()
                .filter(|(_, occ)| **occ == departing)
                .map(|(id, _)| id.clone())
                .collect();
            for timer_id in obsolete {
                instance.clear_timer(&timer_id);
                effects.removed_timers.push(timer_id);
            }
        }

        instance.record(
            Some(edge.source.clone()),
            Some(edge.target.clone()),
            cause,
            actor,
            detail,
        );
        instance.enter_node(edge.target.clone());
    }

    fn fail_instance(
        &self,
        instance: &mut WorkflowInstance,
        node: &WorkflowNode,
        cause: TransitionCause,
        actor: Option<PrincipalRef>,
        detail: impl Into<String>,
        effects: &mut Effects,
    ) {
        instance.record(Some(node.id.clone()), None, cause, actor, detail);
        let removed = instance.drain_timers();
        effects.removed_timers.extend(removed);
        instance.fail();
    }

    /// First outgoing edge without a distinguished label. This is the
    /// path a node follows when nothing routes it elsewhere.
    fn default_edge<'a>(
        &self,
        definition: &'a WorkflowDefinition,
        node: &WorkflowNode,
    ) -> WorkflowResult<&'a WorkflowEdge> {
        definition
            .outgoing_edges(&node.id)
            .into_iter()
            .find(|edge| !edge.is_distinguished())
            .ok_or_else(|| WorkflowError::MissingOutgoingEdge {
                node_id: node.id.clone(),
                needed: "default".into(),
            })
    }

    fn current_node<'a>(
        &self,
        instance: &WorkflowInstance,
        definition: &'a WorkflowDefinition,
    ) -> WorkflowResult<&'a WorkflowNode> {
        let occurrence = instance.active_occurrence().ok_or_else(|| {
            WorkflowError::InstanceTerminal {
                instance_id: instance.id.clone(),
                status: format!("{:?}", instance.status),
            }
        })?;
        definition
            .get_node(&occurrence.node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(occurrence.node_id.clone()))
    }

    /// Persist the outcome of one signal application. New timer records
    /// go first, obsolete ones are removed only after the instance is
    /// saved. A crash anywhere in between leaves at worst an orphaned
    /// timer record, which resolves as stale when it fires; it can
    /// never lose a deadline the saved instance still expects.
    async fn persist(&self, instance: &WorkflowInstance, effects: Effects) -> WorkflowResult<()> {
        for timer in &effects.new_timers {
            self.store.save_timer(timer).await?;
        }
        self.store.save_instance(instance).await?;
        for timer_id in &effects.removed_timers {
            self.store.remove_timer(timer_id).await?;
        }
        Ok(())
    }

    /// Drop the durable record behind a fired timer that turned out to
    /// be stale, so it does not re-fire every sweep.
    async fn discard_fired_timer(&self, signal: &Signal) -> WorkflowResult<()> {
        if let Signal::TimerFired { timer_id, .. } = signal {
            self.store.remove_timer(timer_id).await?;
        }
        Ok(())
    }

    fn lock_for(&self, instance_id: &WorkflowInstanceId) -> Arc<Mutex<()>> {
        self.locks
            .entry(instance_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Side effects accumulated while applying a signal, persisted in one
/// batch at the end.
#[derive(Debug, Default)]
struct Effects {
    new_timers: Vec<TimerRecord>,
    removed_timers: Vec<TimerId>,
}
