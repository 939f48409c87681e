//! Principal references: who a node is assigned or escalated to
//!
//! A principal reference names either a concrete user or a role. Role
//! references are expanded to concrete users by the principal resolution
//! collaborator at notification time, never stored pre-expanded.

use serde::{Deserialize, Serialize};

/// A reference to a user or a role.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalRef {
    /// A concrete user identifier
    User(String),
    /// A role to be expanded at resolution time
    Role(String),
}

impl PrincipalRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::Role(id.into())
    }

    pub fn is_role(&self) -> bool {
        matches!(self, Self::Role(_))
    }
}

impl std::fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Role(id) => write!(f, "role:{}", id),
        }
    }
}

/// A resolved, concrete user identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
