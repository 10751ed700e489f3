//! Consistency view over both endpoints of an edge
//!
//! An edge between two identities is stored twice, once per owner record,
//! and the two per-record updates that change it are not atomic together.
//! [`PairView`] reads both records, reports where they disagree, and plans
//! the idempotent set mutations that bring the pair back to a settled state.

use crate::identity::{Identity, UserId};
use crate::relation::{RelationSet, SetMutation};

/// Settled state of an unordered pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// No relationship
    None,

    /// A pending request from `from` to `to`
    Pending {
        /// Requester
        from: UserId,
        /// Recipient
        to: UserId,
    },

    /// Mutual friends
    Friends,
}

impl PairState {
    /// A pending request from `from` to `to`
    pub fn pending(from: UserId, to: UserId) -> Self {
        PairState::Pending { from, to }
    }
}

/// A specific disagreement between the two records of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asymmetry {
    /// `holder` lists `missing` as a friend but not the other way round
    OneSidedFriend {
        /// Record holding the friend entry
        holder: UserId,
        /// Record lacking the reverse entry
        missing: UserId,
    },

    /// `requester` lists an outgoing request that `recipient` never received
    DanglingOutgoing {
        /// Requester
        requester: UserId,
        /// Recipient
        recipient: UserId,
    },

    /// `recipient` lists an incoming request that `requester` no longer holds
    DanglingIncoming {
        /// Requester
        requester: UserId,
        /// Recipient
        recipient: UserId,
    },

    /// Pending entries coexist with a friend entry
    RequestWhileFriends,

    /// Pending entries exist in both directions
    CrossedRequests,
}

/// Per-record mutations that move a pair to a target state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    /// Mutations for the first record of the view
    pub first: Vec<SetMutation>,

    /// Mutations for the second record of the view
    pub second: Vec<SetMutation>,
}

impl RepairPlan {
    /// Whether the pair is already in the target state
    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }
}

/// Read-only view over the two records of a pair
#[derive(Debug, Clone, Copy)]
pub struct PairView<'a> {
    first: &'a Identity,
    second: &'a Identity,
}

/// Membership flags for one direction of the pair
#[derive(Debug, Clone, Copy)]
struct Direction {
    outgoing: bool,
    incoming: bool,
}

impl Direction {
    fn any(&self) -> bool {
        self.outgoing || self.incoming
    }
}

impl<'a> PairView<'a> {
    /// Build a view over two distinct records
    pub fn new(first: &'a Identity, second: &'a Identity) -> Self {
        Self { first, second }
    }

    fn forward(&self) -> Direction {
        Direction {
            outgoing: self.first.contains(RelationSet::OutgoingRequests, self.second.id),
            incoming: self.second.contains(RelationSet::IncomingRequests, self.first.id),
        }
    }

    fn backward(&self) -> Direction {
        Direction {
            outgoing: self.second.contains(RelationSet::OutgoingRequests, self.first.id),
            incoming: self.first.contains(RelationSet::IncomingRequests, self.second.id),
        }
    }

    fn friend_flags(&self) -> (bool, bool) {
        (
            self.first.contains(RelationSet::Friends, self.second.id),
            self.second.contains(RelationSet::Friends, self.first.id),
        )
    }

    /// Every disagreement between the two records
    pub fn asymmetries(&self) -> Vec<Asymmetry> {
        let (a, b) = (self.first.id, self.second.id);
        let (fa, fb) = self.friend_flags();
        let forward = self.forward();
        let backward = self.backward();
        let mut found = Vec::new();

        if fa != fb {
            let (holder, missing) = if fa { (a, b) } else { (b, a) };
            found.push(Asymmetry::OneSidedFriend { holder, missing });
        }

        for (dir, requester, recipient) in [(forward, a, b), (backward, b, a)] {
            if dir.outgoing && !dir.incoming {
                found.push(Asymmetry::DanglingOutgoing {
                    requester,
                    recipient,
                });
            } else if dir.incoming && !dir.outgoing {
                found.push(Asymmetry::DanglingIncoming {
                    requester,
                    recipient,
                });
            }
        }

        if (fa || fb) && (forward.any() || backward.any()) {
            found.push(Asymmetry::RequestWhileFriends);
        }
        if forward.any() && backward.any() {
            found.push(Asymmetry::CrossedRequests);
        }

        found
    }

    /// The settled state, or `None` if the records disagree
    pub fn settled_state(&self) -> Option<PairState> {
        if !self.asymmetries().is_empty() {
            return None;
        }
        let (fa, _) = self.friend_flags();
        Some(if fa {
            PairState::Friends
        } else if self.forward().outgoing {
            PairState::pending(self.first.id, self.second.id)
        } else if self.backward().outgoing {
            PairState::pending(self.second.id, self.first.id)
        } else {
            PairState::None
        })
    }

    /// The state a reconciliation settles the pair into
    ///
    /// - a friend entry on either side plus any evidence of a request or
    ///   the reverse friend entry resolves to friendship; a lone one-sided
    ///   friend entry is a half-applied removal and resolves to none
    /// - outgoing requests in both directions resolve to friendship
    /// - a request survives only if the requester still holds it
    pub fn resolution(&self) -> PairState {
        if let Some(state) = self.settled_state() {
            return state;
        }
        let (fa, fb) = self.friend_flags();
        let forward = self.forward();
        let backward = self.backward();

        if fa || fb {
            if (fa && fb) || forward.any() || backward.any() {
                PairState::Friends
            } else {
                PairState::None
            }
        } else if forward.outgoing && backward.outgoing {
            PairState::Friends
        } else if forward.outgoing {
            PairState::pending(self.first.id, self.second.id)
        } else if backward.outgoing {
            PairState::pending(self.second.id, self.first.id)
        } else {
            PairState::None
        }
    }

    /// Mutations that move both records to `target`
    ///
    /// Only mutations that change a set are included, so a plan computed
    /// against a pair already in `target` is empty.
    pub fn plan(&self, target: PairState) -> RepairPlan {
        RepairPlan {
            first: Self::plan_for(self.first, self.second.id, target),
            second: Self::plan_for(self.second, self.first.id, target),
        }
    }

    fn plan_for(owner: &Identity, other: UserId, target: PairState) -> Vec<SetMutation> {
        let wanted = |set: RelationSet| match target {
            PairState::None => false,
            PairState::Friends => set == RelationSet::Friends,
            PairState::Pending { from, .. } if from == owner.id => {
                set == RelationSet::OutgoingRequests
            }
            PairState::Pending { .. } => set == RelationSet::IncomingRequests,
        };

        RelationSet::ALL
            .into_iter()
            .filter_map(|set| match (wanted(set), owner.contains(set, other)) {
                (true, false) => Some(SetMutation::Add(set, other)),
                (false, true) => Some(SetMutation::Remove(set, other)),
                _ => None,
            })
            .collect()
    }
}
