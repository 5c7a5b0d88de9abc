//! `kardex-approval` — actor eligibility policy for document transitions.
//!
//! Encodes the three gate rules: role-based authorization, non-self-approval,
//! and approver/releaser segregation of duties.

pub mod actor;
pub mod gate;
pub mod policy;

pub use actor::{Actor, Role};
pub use gate::{ApprovalGate, GateError};
pub use policy::{Permission, RolePolicy, default_policy, permissions};
