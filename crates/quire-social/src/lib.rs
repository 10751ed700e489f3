//! Quire Social
//!
//! The friend-relationship engine: creates, accepts, rejects, and removes
//! bidirectional connections between two independently stored identity
//! records, and derives a consistent relationship status on read paths.
//!
//! # Consistency
//!
//! An edge is stored on both of its endpoints and there is no cross-record
//! transaction. Each operation therefore:
//!
//! 1. reads both records fresh,
//! 2. validates against the principal's sets,
//! 3. issues one idempotent update per owning record, concurrently.
//!
//! A half-applied operation is repaired by re-applying it, by the cleanup in
//! [`RelationshipService::accept_connection`], or explicitly with
//! [`RelationshipService::reconcile_pair`].
//!
//! # Usage
//!
//! ```no_run
//! use quire_social::{RelationshipService, ServiceConfig};
//! use quire_store::SqliteStore;
//! use quire_domain::traits::IdentityStore;
//! use quire_domain::NewIdentity;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new(":memory:")?;
//! let alice = store.create(NewIdentity::new("Alice")).await?.id;
//! let bob = store.create(NewIdentity::new("Bob")).await?.id;
//!
//! let service = RelationshipService::new(store, ServiceConfig::default());
//! service.request_connection(alice, bob).await?;
//! service.accept_connection(bob, alice).await?;
//! assert_eq!(service.list_friends(alice).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod annotate;
mod config;
mod error;
mod service;

pub use annotate::{annotate_with, AnnotatedProfile};
pub use config::ServiceConfig;
pub use error::{ErrorKind, SocialError};
pub use service::{require_principal, PairReport, RelationshipService};
