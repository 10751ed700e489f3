//! Quire Domain Layer
//!
//! Core model for the Quire friend-relationship engine. This crate defines
//! the identity aggregate, the relation sets it owns, the pure status
//! derivation used by read paths, and the trait seams that infrastructure
//! crates implement.
//!
//! ## Key Concepts
//!
//! - **Identity**: an opaque id plus three relation sets
//!   (`friends`, `outgoing_requests`, `incoming_requests`)
//! - **Edge**: the logical relationship between two identities, stored
//!   redundantly on both endpoints
//! - **Relationship status**: what one identity sees when looking at another
//! - **Pair state**: the consistency view over both endpoints of an edge
//!
//! ## Architecture
//!
//! - Pure business logic only; no I/O
//! - Storage and principal resolution are traits implemented elsewhere
//! - Relation sets are only mutated through [`traits::IdentityStore::apply`],
//!   driven by the relationship service

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consistency;
pub mod identity;
pub mod relation;
pub mod status;
pub mod traits;

// Re-exports for convenience
pub use consistency::{Asymmetry, PairState, PairView, RepairPlan};
pub use identity::{Identity, NewIdentity, PublicProfile, UserId};
pub use relation::{RelationSet, SetMutation};
pub use status::{derive_status, RelationshipStatus};
pub use traits::{IdentityResolver, IdentityStore, RequestContext};
