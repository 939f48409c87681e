//! Event gateway and principal resolution seams
//!
//! The engine never sends mail or chat messages itself. When a node
//! requires humans to be told something (an Approval assignment, a
//! Notification node, an escalation) it renders the request and hands
//! it to an [`EventGateway`]. Delivery failures never fail the
//! workflow; they are recorded as instance warnings.
//!
//! [`PrincipalResolver`] maps role references to concrete users so a
//! definition can say `role:qa-lead` without naming individuals.

use async_trait::async_trait;
use limsflow_types::{PrincipalRef, UserId};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
}

/// Acknowledgement of a dispatched notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryAck {
    /// How many recipients the gateway accepted the message for
    pub accepted: usize,
}

/// A rendered notification ready for delivery.
#[derive(Clone, Debug)]
pub struct NotificationRequest {
    pub recipients: Vec<PrincipalRef>,
    /// Template name from the node definition
    pub template: String,
    /// Instance context snapshot for template rendering
    pub context: HashMap<String, String>,
}

/// Outbound seam to the surrounding system's messaging infrastructure.
#[async_trait]
pub trait EventGateway: Send + Sync {
    async fn notify(&self, request: NotificationRequest) -> Result<DeliveryAck, GatewayError>;
}

/// Resolves role references to concrete users.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Expand a principal reference. A `User` resolves to itself; a
    /// `Role` resolves to its current members (possibly empty).
    async fn resolve(&self, principal: &PrincipalRef) -> Vec<UserId>;
}

// ── Bundled implementations ──────────────────────────────────────────

/// Gateway that accepts and discards everything. Useful for headless
/// deployments and tests that do not assert on notifications.
#[derive(Clone, Debug, Default)]
pub struct NullGateway;

#[async_trait]
impl EventGateway for NullGateway {
    async fn notify(&self, request: NotificationRequest) -> Result<DeliveryAck, GatewayError> {
        Ok(DeliveryAck {
            accepted: request.recipients.len(),
        })
    }
}

/// Gateway that records every request it receives.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: std::sync::Mutex<Vec<NotificationRequest>>,
    /// When true, every notify call fails
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent().len()
    }
}

#[async_trait]
impl EventGateway for RecordingGateway {
    async fn notify(&self, request: NotificationRequest) -> Result<DeliveryAck, GatewayError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(GatewayError::DeliveryFailed("gateway offline".into()));
        }
        let accepted = request.recipients.len();
        if let Ok(mut guard) = self.sent.lock() {
            guard.push(request);
        }
        Ok(DeliveryAck { accepted })
    }
}

/// Resolver backed by a fixed role-to-members table.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    roles: HashMap<String, Vec<UserId>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>, members: Vec<UserId>) -> Self {
        self.roles.insert(role.into(), members);
        self
    }
}

#[async_trait]
impl PrincipalResolver for StaticResolver {
    async fn resolve(&self, principal: &PrincipalRef) -> Vec<UserId> {
        match principal {
            PrincipalRef::User(name) => vec![UserId(name.clone())],
            PrincipalRef::Role(role) => self.roles.get(role).cloned().unwrap_or_default(),
        }
    }
}
