//! # Proposal Store
//!
//! Transactional persistence for proposals, versions, decisions and derived
//! projects.
//!
//! All access goes through [`Datastore::transact`], which hands a
//! [`StoreTx`] to a synchronous closure and commits only when the closure
//! returns `Ok`. Two backends are provided:
//!
//! - [`InMemoryStore`] for tests and demos
//! - [`SqliteStore`] for durable storage, safe to share between processes

#![warn(unreachable_pub)]

mod error;
mod memory;
mod repository;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use repository::{Datastore, StoreTx};
pub use sqlite::SqliteStore;
