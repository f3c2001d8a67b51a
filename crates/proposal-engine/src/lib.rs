//! # Proposal Engine
//!
//! Governs how a proposal moves from idea to institutional record:
//! - [`VersionStore`]: append-only content snapshots per proposal
//! - [`DecisionProcessor`]: reviewer verdicts and their side effects
//! - [`LifecycleService`]: authorization, transactions and best-effort
//!   audit/notification around the two above
//!
//! The status transition table itself lives in
//! [`proposal_core::state_machine`]; persistence in [`proposal_store`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use proposal_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), LifecycleError> {
//! let teams = Arc::new(StaticTeamDirectory::new());
//! let collaborators = Collaborators::new(
//!     teams,
//!     Arc::new(InMemoryFileStore::new()),
//!     Arc::new(RecordingAuditSink::new()),
//!     Arc::new(RecordingNotifier::new()),
//! );
//! let service = LifecycleService::new(
//!     Arc::new(InMemoryStore::new()),
//!     collaborators,
//!     EngineConfig::default(),
//! );
//!
//! let leader = Actor::new(100, Role::Student);
//! let content = ProposalContent::new("Solar irrigation", "Farms waste water");
//! let (proposal, v1) = service.create_draft(&leader, TeamId(7), content).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod collaborators;
pub mod config;
pub mod decision;
pub mod error;
pub mod lifecycle;
pub mod version_store;

pub use collaborators::{
    Actor, AdvisoryAnalyzer, AdvisoryReport, AuditEntry, AuditSink, CollaboratorError,
    Collaborators, FileStore, Notification, NotificationEvent, Notifier, Role, TeamDirectory,
    TeamInfo,
};
pub use config::{ConfigError, EngineConfig};
pub use decision::{DecisionOutcome, DecisionProcessor, DecisionRequest};
pub use error::{EntityKind, LifecycleError, LifecycleResult};
pub use lifecycle::{LifecycleService, ProposalView};
pub use version_store::VersionStore;

/// Commonly used types
pub mod prelude {
    pub use crate::collaborators::memory::{
        CompletenessAnalyzer, InMemoryFileStore, RecordingAuditSink, RecordingNotifier,
        StaticTeamDirectory,
    };
    pub use crate::{
        Actor, Collaborators, EngineConfig, LifecycleError, LifecycleResult, LifecycleService,
        Role, TeamInfo,
    };
    pub use proposal_core::{
        DecisionKind, ProposalContent, ProposalFilter, ProposalId, ProposalStatus, TeamId, UserId,
        Visibility,
    };
    pub use proposal_store::{Datastore, InMemoryStore, SqliteStore};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
