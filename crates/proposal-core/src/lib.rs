//! Proposal Core - domain model of the proposal lifecycle
//!
//! Defines:
//! - Identifier newtypes for engine-owned and external entities
//! - Proposal content and its validation rules
//! - The persistent entities (proposal, version, decision, derived project)
//! - The closed status enum and its transition table

#![warn(unreachable_pub)]

pub mod content;
pub mod error;
pub mod ids;
pub mod model;
pub mod state_machine;
pub mod status;

pub use content::{ContentLimits, FileDescriptor, ProposalContent};
pub use error::{ContentError, ParseEnumError, TransitionError};
pub use ids::{DecisionId, DepartmentId, ProjectId, ProposalId, TeamId, UserId, VersionId};
pub use model::{
    Decision, DecisionKind, DerivedRecord, Proposal, ProposalFilter, ProposalVersion, Visibility,
};
pub use status::ProposalStatus;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
