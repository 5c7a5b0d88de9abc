use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "outbound.release").
/// The special wildcard permission `"*"` marks elevated/override roles: it
/// grants every transition and bypasses segregation-of-duties checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gate-checked transitions, one permission per guarded edge.
pub mod permissions {
    use super::Permission;

    pub const PR_APPROVE: Permission = Permission::from_static("purchasing.request.approve");
    pub const PR_REJECT: Permission = Permission::from_static("purchasing.request.reject");
    pub const PR_CONFIRM: Permission = Permission::from_static("purchasing.request.confirm");
    pub const PAYMENT_RELEASE: Permission = Permission::from_static("purchasing.payment.release");
    pub const PO_ISSUE: Permission = Permission::from_static("purchasing.po.issue");

    pub const RECEIPT_VERIFY: Permission = Permission::from_static("receiving.receipt.verify");
    pub const DISCREPANCY_RESOLVE: Permission =
        Permission::from_static("receiving.discrepancy.resolve");

    pub const RELEASE_APPROVE: Permission = Permission::from_static("outbound.release.approve");
    pub const RELEASE_REJECT: Permission = Permission::from_static("outbound.release.reject");
    pub const RELEASE_STOCK: Permission = Permission::from_static("outbound.release.release");

    pub const ADJUSTMENT_APPROVE: Permission = Permission::from_static("adjustment.approve");
    pub const ADJUSTMENT_REJECT: Permission = Permission::from_static("adjustment.reject");

    pub const RETURN_APPROVE: Permission = Permission::from_static("returns.approve");
    pub const RETURN_REJECT: Permission = Permission::from_static("returns.reject");
    pub const RETURN_SEND: Permission = Permission::from_static("returns.send");
    pub const RETURN_COMPLETE: Permission = Permission::from_static("returns.complete");
    pub const RETURN_KEEP: Permission = Permission::from_static("returns.keep");

    pub const OPNAME_COUNT: Permission = Permission::from_static("opname.count.submit");
    pub const OPNAME_COMPARE: Permission = Permission::from_static("opname.sheet.compare");
    pub const OPNAME_REJECT_SHEET: Permission = Permission::from_static("opname.sheet.reject");
    pub const OPNAME_FINALIZE: Permission = Permission::from_static("opname.finalize");
}

/// Role name -> granted permissions.
///
/// Kept as a plain function type so a policy source (config, database) can be
/// swapped in without touching the gate.
pub type RolePolicy = fn(&str) -> Vec<Permission>;

/// The shipped role set.
///
/// "admin" is the elevated role: its wildcard grants every transition and
/// bypasses the approver-vs-releaser segregation rule.
pub fn default_policy(role: &str) -> Vec<Permission> {
    use permissions::*;

    match role {
        "admin" => vec![Permission::from_static("*")],
        "manager" => vec![
            PR_APPROVE,
            PR_REJECT,
            RELEASE_APPROVE,
            RELEASE_REJECT,
            ADJUSTMENT_APPROVE,
            ADJUSTMENT_REJECT,
            RETURN_APPROVE,
            RETURN_REJECT,
            OPNAME_FINALIZE,
        ],
        "purchasing" => vec![PR_CONFIRM, PO_ISSUE],
        "finance" => vec![PAYMENT_RELEASE],
        "warehouse" => vec![
            RECEIPT_VERIFY,
            DISCREPANCY_RESOLVE,
            RELEASE_STOCK,
            RETURN_SEND,
            RETURN_COMPLETE,
            RETURN_KEEP,
        ],
        "auditor" => vec![OPNAME_COUNT, OPNAME_COMPARE, OPNAME_REJECT_SHEET],
        _ => vec![],
    }
}
