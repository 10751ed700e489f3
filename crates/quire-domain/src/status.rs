//! Relationship status derivation
//!
//! Read paths (search, listing, status lookups) never look at raw sets;
//! they ask [`derive_status`] what the viewer sees.

use crate::identity::{Identity, UserId};
use crate::relation::RelationSet;

/// What a viewer sees when looking at a candidate identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipStatus {
    /// Mutual friends
    Friends,

    /// The viewer has a pending request to the candidate
    RequestSent,

    /// The candidate has a pending request to the viewer
    RequestReceived,

    /// No relationship
    None,
}

impl RelationshipStatus {
    /// Get the wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStatus::Friends => "friends",
            RelationshipStatus::RequestSent => "request_sent",
            RelationshipStatus::RequestReceived => "request_received",
            RelationshipStatus::None => "none",
        }
    }
}

impl std::fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the viewer's relationship status toward `candidate`
///
/// Precedence is friends, then outgoing, then incoming. Friendship wins
/// over any transient double state.
pub fn derive_status(viewer: &Identity, candidate: UserId) -> RelationshipStatus {
    if viewer.contains(RelationSet::Friends, candidate) {
        RelationshipStatus::Friends
    } else if viewer.contains(RelationSet::OutgoingRequests, candidate) {
        RelationshipStatus::RequestSent
    } else if viewer.contains(RelationSet::IncomingRequests, candidate) {
        RelationshipStatus::RequestReceived
    } else {
        RelationshipStatus::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> Identity {
        Identity::new(UserId::from_value(1), "viewer", None, 0)
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(
            derive_status(&viewer(), UserId::from_value(2)),
            RelationshipStatus::None
        );
    }

    #[test]
    fn test_each_set_maps_to_status() {
        let c = UserId::from_value(2);
        let v = viewer().with_members(RelationSet::OutgoingRequests, [c]);
        assert_eq!(derive_status(&v, c), RelationshipStatus::RequestSent);

        let v = viewer().with_members(RelationSet::IncomingRequests, [c]);
        assert_eq!(derive_status(&v, c), RelationshipStatus::RequestReceived);

        let v = viewer().with_members(RelationSet::Friends, [c]);
        assert_eq!(derive_status(&v, c), RelationshipStatus::Friends);
    }

    #[test]
    fn test_friends_takes_precedence() {
        let c = UserId::from_value(2);
        let v = viewer()
            .with_members(RelationSet::Friends, [c])
            .with_members(RelationSet::OutgoingRequests, [c])
            .with_members(RelationSet::IncomingRequests, [c]);
        assert_eq!(derive_status(&v, c), RelationshipStatus::Friends);

        let v = viewer()
            .with_members(RelationSet::OutgoingRequests, [c])
            .with_members(RelationSet::IncomingRequests, [c]);
        assert_eq!(derive_status(&v, c), RelationshipStatus::RequestSent);
    }
}
