//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{Identity, NewIdentity, PublicProfile, RelationSet, SetMutation, UserId};
use async_trait::async_trait;

/// Per-record document store for identities
///
/// Implemented by the infrastructure layer (quire-store).
/// Every method touches at most one identity record, except the read-only
/// projection lookups. There is no cross-record transaction.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get an identity by ID
    async fn get(&self, id: UserId) -> Result<Option<Identity>, Self::Error>;

    /// Apply mutations to one record's relation sets atomically
    ///
    /// Each mutation is idempotent: adding a present member or removing an
    /// absent one is a no-op, never an error.
    async fn apply(&self, id: UserId, mutations: &[SetMutation]) -> Result<(), Self::Error>;

    /// Insert `value` into one relation set of record `id`
    async fn add_to_set(
        &self,
        id: UserId,
        set: RelationSet,
        value: UserId,
    ) -> Result<(), Self::Error> {
        self.apply(id, &[SetMutation::Add(set, value)]).await
    }

    /// Remove `value` from one relation set of record `id`
    async fn remove_from_set(
        &self,
        id: UserId,
        set: RelationSet,
        value: UserId,
    ) -> Result<(), Self::Error> {
        self.apply(id, &[SetMutation::Remove(set, value)]).await
    }

    /// Resolve ids to public projections, skipping unknown ids
    ///
    /// Results are ordered by display name, then id.
    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<PublicProfile>, Self::Error>;

    /// Register a new identity with empty relation sets
    async fn create(&self, identity: NewIdentity) -> Result<Identity, Self::Error>;

    /// Directory search over display names and external handles
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<PublicProfile>, Self::Error>;
}

/// Inbound request data a resolver can authenticate from
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Raw bearer credential, if the caller presented one
    pub bearer_token: Option<String>,
}

impl RequestContext {
    /// Context carrying a bearer credential
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }
}

/// Resolves the authenticated principal of an inbound request
///
/// Implemented by the transport layer (quire-server).
pub trait IdentityResolver: Send + Sync {
    /// The principal behind `context`, or `None` if unauthenticated
    fn resolve_current_principal(&self, context: &RequestContext) -> Option<UserId>;
}
