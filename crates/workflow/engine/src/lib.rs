//! Workflow execution engine for limsflow
//!
//! This crate runs instances of validated workflow definitions. It
//! contains:
//!
//! 1. The [`DefinitionRegistry`]: versioned storage for definitions
//!    with a Draft/Active/Deprecated lifecycle
//! 2. The [`InstanceStore`] trait and its in-memory implementation:
//!    durable state for instances and pending timers
//! 3. The [`WorkflowEngine`]: signal delivery, token movement, and the
//!    exactly-once advance semantics
//! 4. The [`TimerScheduler`]: a store-backed polling scheduler that
//!    survives restarts, delivering timer firings at least once
//! 5. The [`EventGateway`] and [`PrincipalResolver`] seams for the
//!    surrounding system (notification delivery, assignee resolution)
//!
//! The engine never performs the work a node represents. It tracks
//! where the token is, notifies the principals who must act, and moves
//! the token when signals arrive.

#![deny(unsafe_code)]

mod condition;
mod engine;
mod gateway;
mod registry;
mod scheduler;
mod store;

pub use condition::*;
pub use engine::*;
pub use gateway::*;
pub use registry::*;
pub use scheduler::*;
pub use store::*;
