//! Workflow Domain Types for limsflow
//!
//! limsflow models regulated business processes (document review, approval
//! chains, timed waits, escalations) as **typed directed graphs** that are
//! validated before activation and executed with an auditable history.
//!
//! # Key Concepts
//!
//! - **WorkflowDefinition**: An authored, versioned graph of typed nodes
//!   and labeled edges. Immutable once Active; edits create a new version.
//! - **WorkflowInstance**: One running execution of a definition. Carries a
//!   single token (the active [`NodeOccurrence`]), a data context, and an
//!   append-only [`TransitionRecord`] history.
//! - **Signal**: An external event delivered to the engine that may cause a
//!   transition, such as an approval decision or a timer firing.
//! - **Stale signal**: A signal referencing a node occurrence the instance
//!   has already left. Safely ignored, never an error.
//!
//! # Design Principles
//!
//! 1. Definitions are validated structurally before they may run.
//! 2. Every transition is recorded. History is append-only and total
//!    per instance.
//! 3. Escalation and timeout behavior is explicit in the graph, never a
//!    hidden default.

#![deny(unsafe_code)]

mod definition;
mod edge;
mod errors;
mod instance;
mod node;
mod principal;
mod signal;

pub use definition::*;
pub use edge::*;
pub use errors::*;
pub use instance::*;
pub use node::*;
pub use principal::*;
pub use signal::*;
