use std::collections::HashSet;

use thiserror::Error;

use kardex_core::{Approvable, Document, DomainError};

use crate::actor::Actor;
use crate::policy::{Permission, RolePolicy, default_policy};

/// Why the gate denied a transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("missing permission '{0}'")]
    Forbidden(String),

    #[error("document creators cannot approve their own documents")]
    SelfApproval,

    #[error("the approver of a document cannot also release it")]
    SegregationOfDuties,
}

impl From<GateError> for DomainError {
    fn from(value: GateError) -> Self {
        DomainError::PermissionDenied(value.to_string())
    }
}

/// Cross-cutting approval policy consulted by every document transition.
///
/// A deny is non-fatal: it surfaces a `PermissionDenied` outcome to the
/// caller and never partially applies a transition.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub struct ApprovalGate {
    policy: RolePolicy,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new(default_policy)
    }
}

impl ApprovalGate {
    pub fn new(policy: RolePolicy) -> Self {
        Self { policy }
    }

    fn effective_permissions(&self, actor: &Actor) -> HashSet<String> {
        let mut perms = HashSet::new();
        for role in &actor.roles {
            for perm in (self.policy)(role.as_str()) {
                perms.insert(perm.as_str().to_string());
            }
        }
        perms
    }

    /// Whether the actor holds the wildcard permission (elevated role).
    pub fn is_elevated(&self, actor: &Actor) -> bool {
        self.effective_permissions(actor).contains("*")
    }

    /// Rule (1): the actor must hold a role authorized for the transition.
    pub fn authorize(&self, actor: &Actor, required: &Permission) -> Result<(), GateError> {
        let perms = self.effective_permissions(actor);
        if perms.contains("*") || perms.contains(required.as_str()) {
            Ok(())
        } else {
            Err(GateError::Forbidden(required.as_str().to_string()))
        }
    }

    /// Rule (2): transitions requiring independent approval cannot be
    /// performed by the document's creator.
    pub fn ensure_independent<D: Document>(&self, actor: &Actor, doc: &D) -> Result<(), GateError> {
        if actor.user_id == doc.created_by() {
            Err(GateError::SelfApproval)
        } else {
            Ok(())
        }
    }

    /// Rule (3): a release following an approval cannot be performed by the
    /// approver, unless the actor holds an elevated role.
    pub fn ensure_segregated<D: Approvable>(&self, actor: &Actor, doc: &D) -> Result<(), GateError> {
        if doc.approved_by() == Some(actor.user_id) && !self.is_elevated(actor) {
            Err(GateError::SegregationOfDuties)
        } else {
            Ok(())
        }
    }

    /// Combined check for approval-style transitions: rules (1) and (2).
    pub fn can_approve<D: Document>(
        &self,
        actor: &Actor,
        doc: &D,
        required: &Permission,
    ) -> Result<(), GateError> {
        self.authorize(actor, required)?;
        self.ensure_independent(actor, doc)
    }

    /// Combined check for release-style transitions: rules (1) and (3).
    pub fn can_release<D: Approvable>(
        &self,
        actor: &Actor,
        doc: &D,
        required: &Permission,
    ) -> Result<(), GateError> {
        self.authorize(actor, required)?;
        self.ensure_segregated(actor, doc)
    }
}
