//! Relation sets and the element-level mutations applied to them

use crate::identity::UserId;

/// One of the three relation sets every identity owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationSet {
    /// Mutual friends (symmetric)
    Friends,

    /// Pending requests this identity has sent
    OutgoingRequests,

    /// Pending requests this identity has received
    IncomingRequests,
}

impl RelationSet {
    /// All relation sets, in storage order
    pub const ALL: [RelationSet; 3] = [
        RelationSet::Friends,
        RelationSet::OutgoingRequests,
        RelationSet::IncomingRequests,
    ];

    /// Get the storage name of the set
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationSet::Friends => "friends",
            RelationSet::OutgoingRequests => "outgoing_requests",
            RelationSet::IncomingRequests => "incoming_requests",
        }
    }

    /// Parse a set from its storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "friends" => Some(RelationSet::Friends),
            "outgoing_requests" => Some(RelationSet::OutgoingRequests),
            "incoming_requests" => Some(RelationSet::IncomingRequests),
            _ => None,
        }
    }
}

/// A single idempotent mutation of one relation set
///
/// A slice of these targeting the same record forms one per-record update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMutation {
    /// Insert a member (no-op if present)
    Add(RelationSet, UserId),

    /// Remove a member (no-op if absent)
    Remove(RelationSet, UserId),
}

impl SetMutation {
    /// The set this mutation targets
    pub fn set(&self) -> RelationSet {
        match self {
            SetMutation::Add(set, _) | SetMutation::Remove(set, _) => *set,
        }
    }

    /// The member this mutation inserts or removes
    pub fn member(&self) -> UserId {
        match self {
            SetMutation::Add(_, id) | SetMutation::Remove(_, id) => *id,
        }
    }
}
