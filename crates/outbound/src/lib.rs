//! `kardex-outbound` — outbound release (goods issue) workflow.

pub mod release;

pub use release::{
    AddLine, Approve, CreateRelease, OutboundRelease, OutboundReleaseCommand,
    OutboundReleaseEvent, OutboundReleaseStatus, Reject, Release, ReleaseInput, ReleaseLine,
    ReleasedLine,
};
