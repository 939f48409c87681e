//! Instance and timer persistence
//!
//! The engine writes an instance's new state to the store before it
//! acknowledges any signal. New timer records are written before the
//! instance state that references them, and obsolete records are
//! removed only after the instance is saved. A crash at any point
//! leaves at worst an orphaned timer, which firing resolves as stale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use limsflow_types::{
    OccurrenceId, TimerId, WorkflowError, WorkflowInstance, WorkflowInstanceId, WorkflowResult,
};
use serde::{Deserialize, Serialize};

/// A durable record of a scheduled timer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerRecord {
    pub id: TimerId,
    pub instance_id: WorkflowInstanceId,
    /// The occurrence the timer was armed for; firings against a
    /// different current occurrence are stale
    pub occurrence_id: OccurrenceId,
    pub fire_at: DateTime<Utc>,
}

impl TimerRecord {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

/// Storage backend for workflow instances and their pending timers.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Persist an instance, replacing any prior state.
    async fn save_instance(&self, instance: &WorkflowInstance) -> WorkflowResult<()>;

    /// Load an instance by id.
    async fn load_instance(
        &self,
        id: &WorkflowInstanceId,
    ) -> WorkflowResult<Option<WorkflowInstance>>;

    /// All instances still in Running status.
    async fn list_running(&self) -> WorkflowResult<Vec<WorkflowInstance>>;

    /// Persist a timer record.
    async fn save_timer(&self, timer: &TimerRecord) -> WorkflowResult<()>;

    /// Remove a timer record. Removing an unknown timer is a no-op.
    async fn remove_timer(&self, id: &TimerId) -> WorkflowResult<()>;

    /// All timers with `fire_at <= now`.
    async fn due_timers(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<TimerRecord>>;

    /// Every pending timer, due or not. Used by crash recovery.
    async fn all_timers(&self) -> WorkflowResult<Vec<TimerRecord>>;
}

/// In-memory store for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    instances: DashMap<WorkflowInstanceId, WorkflowInstance>,
    timers: DashMap<TimerId, TimerRecord>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn save_instance(&self, instance: &WorkflowInstance) -> WorkflowResult<()> {
        self.instances.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn load_instance(
        &self,
        id: &WorkflowInstanceId,
    ) -> WorkflowResult<Option<WorkflowInstance>> {
        Ok(self.instances.get(id).map(|entry| entry.clone()))
    }

    async fn list_running(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self
            .instances
            .iter()
            .filter(|entry| entry.is_running())
            .map(|entry| entry.clone())
            .collect())
    }

    async fn save_timer(&self, timer: &TimerRecord) -> WorkflowResult<()> {
        self.timers.insert(timer.id.clone(), timer.clone());
        Ok(())
    }

    async fn remove_timer(&self, id: &TimerId) -> WorkflowResult<()> {
        self.timers.remove(id);
        Ok(())
    }

    async fn due_timers(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<TimerRecord>> {
        Ok(self
            .timers
            .iter()
            .filter(|entry| entry.is_due(now))
            .map(|entry| entry.clone())
            .collect())
    }

    async fn all_timers(&self) -> WorkflowResult<Vec<TimerRecord>> {
        Ok(self.timers.iter().map(|entry| entry.clone()).collect())
    }
}

/// Fallible wrapper used by tests that exercise persistence failures.
/// Every write succeeds until `set_failing(true)` is called;
/// `set_failing_instance_writes(true)` rejects only instance saves,
/// leaving timer writes intact.
#[derive(Debug, Default)]
pub struct FlakyInstanceStore {
    inner: MemoryInstanceStore,
    fail_writes: std::sync::atomic::AtomicBool,
    fail_instance_writes: std::sync::atomic::AtomicBool,
}

impl FlakyInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_failing_instance_writes(&self, failing: bool) {
        self.fail_instance_writes
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> WorkflowResult<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(WorkflowError::Store("write rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceStore for FlakyInstanceStore {
    async fn save_instance(&self, instance: &WorkflowInstance) -> WorkflowResult<()> {
        self.check()?;
        if self
            .fail_instance_writes
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(WorkflowError::Store("instance write rejected".into()));
        }
        self.inner.save_instance(instance).await
    }

    async fn load_instance(
        &self,
        id: &WorkflowInstanceId,
    ) -> WorkflowResult<Option<WorkflowInstance>> {
        self.inner.load_instance(id).await
    }

    async fn list_running(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        self.inner.list_running().await
    }

    async fn save_timer(&self, timer: &TimerRecord) -> WorkflowResult<()> {
        self.check()?;
        self.inner.save_timer(timer).await
    }

    async fn remove_timer(&self, id: &TimerId) -> WorkflowResult<()> {
        self.check()?;
        self.inner.remove_timer(id).await
    }

    async fn due_timers(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<TimerRecord>> {
        self.inner.due_timers(now).await
    }

    async fn all_timers(&self) -> WorkflowResult<Vec<TimerRecord>> {
        self.inner.all_timers().await
    }
}
