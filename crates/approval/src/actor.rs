use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use kardex_core::UserId;

/// Role identifier used for transition eligibility.
///
/// Roles are intentionally opaque strings at this layer; the mapping from
/// roles to permissions lives in the gate's policy. Role resolution itself
/// (actor id -> role names) is an external service; the gate consumes the
/// resolved result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully resolved acting user for gate decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    /// Convenience constructor for a single-role actor.
    pub fn with_role(user_id: UserId, role: impl Into<Cow<'static, str>>) -> Self {
        Self {
            user_id,
            roles: vec![Role::new(role)],
        }
    }
}
