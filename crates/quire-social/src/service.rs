//! Relationship transition service
//!
//! Every mutating operation reads both records fresh, validates, and then
//! issues one update per owning record. The two updates run concurrently and
//! are not wrapped in a shared transaction; set mutations are idempotent, so
//! re-applying a half-applied operation is always safe.

use crate::config::ServiceConfig;
use crate::error::SocialError;
use quire_domain::traits::{IdentityResolver, IdentityStore, RequestContext};
use quire_domain::{
    derive_status, Asymmetry, Identity, PairState, PairView, PublicProfile, RelationSet,
    RelationshipStatus, RepairPlan, SetMutation, UserId,
};
use std::future::Future;
use tracing::{error, info, warn};

/// Resolve the calling principal or fail with `Unauthenticated`
pub fn require_principal(
    resolver: &dyn IdentityResolver,
    context: &RequestContext,
) -> Result<UserId, SocialError> {
    resolver
        .resolve_current_principal(context)
        .ok_or(SocialError::Unauthenticated)
}

/// Consistency report for a pair of identities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReport {
    /// Settled state, if both records agree
    pub settled: Option<PairState>,

    /// Every disagreement between the two records
    pub asymmetries: Vec<Asymmetry>,
}

/// Operation name and parties, carried into logs
#[derive(Debug, Clone, Copy)]
struct OpContext {
    operation: &'static str,
    principal: UserId,
    counterparty: Option<UserId>,
}

impl OpContext {
    fn new(operation: &'static str, principal: UserId) -> Self {
        Self {
            operation,
            principal,
            counterparty: None,
        }
    }

    fn with(operation: &'static str, principal: UserId, counterparty: UserId) -> Self {
        Self {
            operation,
            principal,
            counterparty: Some(counterparty),
        }
    }
}

/// The relationship engine
///
/// Owns the only code path that mutates relation sets.
pub struct RelationshipService<S> {
    store: S,
    config: ServiceConfig,
}

impl<S: IdentityStore> RelationshipService<S> {
    /// Create a service over `store`
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Send a friend request from `principal` to `target`
    pub async fn request_connection(
        &self,
        principal: UserId,
        target: UserId,
    ) -> Result<(), SocialError> {
        if principal == target {
            return Err(SocialError::Validation(
                "cannot send a friend request to yourself".to_string(),
            ));
        }
        let ctx = OpContext::with("request_connection", principal, target);
        let (me, other) = self.load_pair(ctx, target).await?;

        if me.contains(RelationSet::Friends, target) {
            return Err(SocialError::AlreadyFriends);
        }
        if me.contains(RelationSet::OutgoingRequests, target) {
            return Err(SocialError::RequestAlreadySent);
        }
        if me.contains(RelationSet::IncomingRequests, target) {
            return Err(SocialError::ReciprocalRequestExists);
        }

        let plan = RepairPlan {
            first: vec![SetMutation::Add(RelationSet::OutgoingRequests, target)],
            second: vec![SetMutation::Add(RelationSet::IncomingRequests, principal)],
        };
        self.execute(ctx, me.id, other.id, &plan).await?;

        info!(
            operation = ctx.operation,
            principal = %principal,
            counterparty = %target,
            "friend request sent"
        );
        Ok(())
    }

    /// Accept the pending request `requester` sent to `principal`
    pub async fn accept_connection(
        &self,
        principal: UserId,
        requester: UserId,
    ) -> Result<(), SocialError> {
        if principal == requester {
            return Err(SocialError::Validation(
                "cannot accept a friend request from yourself".to_string(),
            ));
        }
        let ctx = OpContext::with("accept_connection", principal, requester);
        let (me, other) = self.load_pair(ctx, requester).await?;
        let view = PairView::new(&me, &other);

        // Either side may hold the friend entry after a half-applied accept
        let befriended = me.contains(RelationSet::Friends, requester)
            || other.contains(RelationSet::Friends, principal);
        if befriended && view.resolution() == PairState::Friends {
            let plan = view.plan(PairState::Friends);
            if !plan.is_empty() {
                warn!(
                    operation = ctx.operation,
                    principal = %principal,
                    counterparty = %requester,
                    asymmetries = ?view.asymmetries(),
                    "accept on an already-friends pair, cleaning up residual state"
                );
                self.execute(ctx, me.id, other.id, &plan).await?;
            }
            return Err(SocialError::AlreadyFriendsConflict);
        }

        if !me.contains(RelationSet::IncomingRequests, requester)
            || !other.contains(RelationSet::OutgoingRequests, principal)
        {
            return Err(SocialError::InvalidRequestState);
        }

        let plan = view.plan(PairState::Friends);
        self.execute(ctx, me.id, other.id, &plan).await?;

        info!(
            operation = ctx.operation,
            principal = %principal,
            counterparty = %requester,
            "friend request accepted"
        );
        Ok(())
    }

    /// Decline the request `requester` sent to `principal`
    ///
    /// Succeeds whether or not a request was pending.
    pub async fn reject_connection(
        &self,
        principal: UserId,
        requester: UserId,
    ) -> Result<(), SocialError> {
        if principal == requester {
            return Err(SocialError::Validation(
                "cannot reject a friend request from yourself".to_string(),
            ));
        }
        let ctx = OpContext::with("reject_connection", principal, requester);
        let plan = RepairPlan {
            first: vec![SetMutation::Remove(RelationSet::IncomingRequests, requester)],
            second: vec![SetMutation::Remove(RelationSet::OutgoingRequests, principal)],
        };
        self.apply_tolerant(ctx, requester, &plan).await?;

        info!(
            operation = ctx.operation,
            principal = %principal,
            counterparty = %requester,
            "friend request rejected"
        );
        Ok(())
    }

    /// End the friendship between `principal` and `friend`
    ///
    /// Succeeds whether or not the pair were friends.
    pub async fn remove_connection(
        &self,
        principal: UserId,
        friend: UserId,
    ) -> Result<(), SocialError> {
        if principal == friend {
            return Err(SocialError::InvalidSelfOperation);
        }
        let ctx = OpContext::with("remove_connection", principal, friend);
        let plan = RepairPlan {
            first: vec![SetMutation::Remove(RelationSet::Friends, friend)],
            second: vec![SetMutation::Remove(RelationSet::Friends, principal)],
        };
        self.apply_tolerant(ctx, friend, &plan).await?;

        info!(
            operation = ctx.operation,
            principal = %principal,
            counterparty = %friend,
            "friend removed"
        );
        Ok(())
    }

    /// Friends of `principal`
    pub async fn list_friends(&self, principal: UserId) -> Result<Vec<PublicProfile>, SocialError> {
        self.list(OpContext::new("list_friends", principal), RelationSet::Friends)
            .await
    }

    /// Pending requests `principal` has received
    pub async fn list_incoming(
        &self,
        principal: UserId,
    ) -> Result<Vec<PublicProfile>, SocialError> {
        self.list(
            OpContext::new("list_incoming", principal),
            RelationSet::IncomingRequests,
        )
        .await
    }

    /// Pending requests `principal` has sent
    pub async fn list_outgoing(
        &self,
        principal: UserId,
    ) -> Result<Vec<PublicProfile>, SocialError> {
        self.list(
            OpContext::new("list_outgoing", principal),
            RelationSet::OutgoingRequests,
        )
        .await
    }

    /// Relationship status of `candidate` as seen by `principal`
    pub async fn status(
        &self,
        principal: UserId,
        candidate: UserId,
    ) -> Result<RelationshipStatus, SocialError> {
        let ctx = OpContext::with("status", principal, candidate);
        let me = self.load_principal(ctx).await?;
        Ok(derive_status(&me, candidate))
    }

    /// Consistency report for the pair `{a, b}`, without mutating anything
    pub async fn inspect_pair(&self, a: UserId, b: UserId) -> Result<PairReport, SocialError> {
        let ctx = OpContext::with("inspect_pair", a, b);
        let (first, second) = self.load_both(ctx, a, b).await?;
        let view = PairView::new(&first, &second);

        Ok(PairReport {
            settled: view.settled_state(),
            asymmetries: view.asymmetries(),
        })
    }

    /// Bring an asymmetric pair back to a settled state
    ///
    /// A settled pair is left untouched. Returns the resulting state.
    pub async fn reconcile_pair(&self, a: UserId, b: UserId) -> Result<PairState, SocialError> {
        let ctx = OpContext::with("reconcile_pair", a, b);
        let (first, second) = self.load_both(ctx, a, b).await?;
        let view = PairView::new(&first, &second);
        let target = view.resolution();
        let plan = view.plan(target);

        if !plan.is_empty() {
            warn!(
                operation = ctx.operation,
                principal = %a,
                counterparty = %b,
                asymmetries = ?view.asymmetries(),
                target = ?target,
                "repairing asymmetric pair"
            );
            self.execute(ctx, a, b, &plan).await?;
        }
        Ok(target)
    }

    /// Fresh copy of the principal's record for a read-only operation
    pub(crate) async fn principal_record(
        &self,
        operation: &'static str,
        principal: UserId,
    ) -> Result<Identity, SocialError> {
        self.load_principal(OpContext::new(operation, principal)).await
    }

    async fn load_principal(&self, ctx: OpContext) -> Result<Identity, SocialError> {
        self.guard(ctx, self.store.get(ctx.principal))
            .await?
            .ok_or(SocialError::Unauthenticated)
    }

    /// Directory search results for `text`, at most `limit` of them
    pub(crate) async fn directory_search(
        &self,
        principal: UserId,
        text: &str,
        limit: usize,
    ) -> Result<Vec<PublicProfile>, SocialError> {
        let ctx = OpContext::new("search", principal);
        self.guard(ctx, self.store.search(text, limit)).await
    }

    async fn list(
        &self,
        ctx: OpContext,
        set: RelationSet,
    ) -> Result<Vec<PublicProfile>, SocialError> {
        let me = self.load_principal(ctx).await?;
        let ids: Vec<UserId> = me.members(set).iter().copied().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.guard(ctx, self.store.find_many(&ids)).await
    }

    /// Principal and counterparty records, read concurrently
    async fn load_pair(
        &self,
        ctx: OpContext,
        counterparty: UserId,
    ) -> Result<(Identity, Identity), SocialError> {
        let (me, other) = tokio::try_join!(
            self.guard(ctx, self.store.get(ctx.principal)),
            self.guard(ctx, self.store.get(counterparty)),
        )?;
        let me = me.ok_or(SocialError::Unauthenticated)?;
        let other = other.ok_or(SocialError::NotFound(counterparty))?;
        Ok((me, other))
    }

    async fn load_both(
        &self,
        ctx: OpContext,
        a: UserId,
        b: UserId,
    ) -> Result<(Identity, Identity), SocialError> {
        if a == b {
            return Err(SocialError::Validation(
                "a pair needs two distinct identities".to_string(),
            ));
        }
        let (first, second) = tokio::try_join!(
            self.guard(ctx, self.store.get(a)),
            self.guard(ctx, self.store.get(b)),
        )?;
        Ok((
            first.ok_or(SocialError::NotFound(a))?,
            second.ok_or(SocialError::NotFound(b))?,
        ))
    }

    /// Pull-only update that tolerates a missing counterparty record
    async fn apply_tolerant(
        &self,
        ctx: OpContext,
        counterparty: UserId,
        plan: &RepairPlan,
    ) -> Result<(), SocialError> {
        let (me, other) = tokio::try_join!(
            self.guard(ctx, self.store.get(ctx.principal)),
            self.guard(ctx, self.store.get(counterparty)),
        )?;
        if me.is_none() {
            return Err(SocialError::Unauthenticated);
        }
        if other.is_none() {
            let plan = RepairPlan {
                first: plan.first.clone(),
                second: Vec::new(),
            };
            return self.execute(ctx, ctx.principal, counterparty, &plan).await;
        }
        self.execute(ctx, ctx.principal, counterparty, plan).await
    }

    /// Issue the two per-record updates of `plan` concurrently
    ///
    /// Both updates run to completion even if one fails, so a failure
    /// leaves at most one side unapplied.
    async fn execute(
        &self,
        ctx: OpContext,
        first: UserId,
        second: UserId,
        plan: &RepairPlan,
    ) -> Result<(), SocialError> {
        let (first, second) = tokio::join!(
            self.apply_side(ctx, first, &plan.first),
            self.apply_side(ctx, second, &plan.second),
        );
        first.and(second)
    }

    async fn apply_side(
        &self,
        ctx: OpContext,
        owner: UserId,
        mutations: &[SetMutation],
    ) -> Result<(), SocialError> {
        if mutations.is_empty() {
            return Ok(());
        }
        self.guard(ctx, self.store.apply(owner, mutations)).await
    }

    /// Bound a store call by the configured timeout and map its failure
    async fn guard<T, F>(&self, ctx: OpContext, call: F) -> Result<T, SocialError>
    where
        F: Future<Output = Result<T, S::Error>>,
    {
        match tokio::time::timeout(self.config.store_timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(
                    operation = ctx.operation,
                    principal = %ctx.principal,
                    counterparty = ?ctx.counterparty.map(|id| id.to_string()),
                    error = %e,
                    "store call failed"
                );
                Err(SocialError::Internal("store unavailable".to_string()))
            }
            Err(_) => {
                error!(
                    operation = ctx.operation,
                    principal = %ctx.principal,
                    counterparty = ?ctx.counterparty.map(|id| id.to_string()),
                    timeout_ms = self.config.store_timeout_ms,
                    "store call timed out"
                );
                Err(SocialError::Internal("store timed out".to_string()))
            }
        }
    }
}
