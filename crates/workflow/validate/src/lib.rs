//! Structural validation for workflow definitions
//!
//! A definition must pass validation before it can be activated. The
//! validator never fails fast: it walks every check and returns the
//! complete list of problems so an author can fix a draft in one pass.
//!
//! Checks cover graph shape (start/end nodes, reachability, dead ends,
//! unguarded loops), edge labeling for Decision branches, and per-kind
//! node configuration (assignees, durations, escalation targets).

#![deny(unsafe_code)]

mod issue;
mod validator;

pub use issue::*;
pub use validator::*;
