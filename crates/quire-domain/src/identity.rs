//! Identity module - the aggregate that owns a user's relation sets

use crate::relation::{RelationSet, SetMutation};
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for an identity based on UUIDv7
///
/// Opaque to callers; ordering follows creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(u128);

impl UserId {
    /// Generate a new UUIDv7-based UserId
    ///
    /// # Examples
    ///
    /// ```
    /// use quire_domain::UserId;
    ///
    /// let id = UserId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a UserId from a raw u128 value
    ///
    /// This is primarily for storage layer deserialization.
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a UserId from its hyphenated UUID string
    ///
    /// # Examples
    ///
    /// ```
    /// use quire_domain::UserId;
    ///
    /// let id = UserId::new();
    /// let parsed = UserId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s.trim())
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid user id '{}': {}", s, e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl std::str::FromStr for UserId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Fields required to register a new identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    /// Name shown to other users
    pub display_name: String,

    /// Optional handle on an external profile (e.g. an OAuth provider)
    pub external_handle: Option<String>,
}

impl NewIdentity {
    /// Create a registration request without an external handle
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            external_handle: None,
        }
    }

    /// Attach an external profile handle
    pub fn with_external_handle(mut self, handle: impl Into<String>) -> Self {
        self.external_handle = Some(handle.into());
        self
    }
}

/// Public projection of an identity
///
/// This is the only shape in which one identity is shown to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicProfile {
    /// Identity id
    pub id: UserId,

    /// Display name
    pub display_name: String,

    /// Optional external profile handle
    pub external_handle: Option<String>,
}

/// An identity record with its three relation sets
///
/// Each record owns its own sets, but every edge is stored on both
/// endpoints: `b ∈ a.friends ⟺ a ∈ b.friends` and
/// `b ∈ a.outgoing_requests ⟺ a ∈ b.incoming_requests` in steady state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Unique identifier
    pub id: UserId,

    /// Name shown to other users
    pub display_name: String,

    /// Optional external profile handle
    pub external_handle: Option<String>,

    /// Registration time (unix seconds)
    pub created_at: u64,

    friends: BTreeSet<UserId>,
    outgoing_requests: BTreeSet<UserId>,
    incoming_requests: BTreeSet<UserId>,
}

impl Identity {
    /// Create an identity with empty relation sets
    pub fn new(
        id: UserId,
        display_name: impl Into<String>,
        external_handle: Option<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            external_handle,
            created_at,
            friends: BTreeSet::new(),
            outgoing_requests: BTreeSet::new(),
            incoming_requests: BTreeSet::new(),
        }
    }

    /// Populate one relation set while hydrating a record from storage
    pub fn with_members<I>(mut self, set: RelationSet, members: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        self.set_mut(set).extend(members);
        self
    }

    /// Check whether `id` is a member of `set`
    pub fn contains(&self, set: RelationSet, id: UserId) -> bool {
        self.set_ref(set).contains(&id)
    }

    /// Members of `set` in id order
    pub fn members(&self, set: RelationSet) -> &BTreeSet<UserId> {
        self.set_ref(set)
    }

    /// `friends` set
    pub fn friends(&self) -> &BTreeSet<UserId> {
        &self.friends
    }

    /// `outgoing_requests` set
    pub fn outgoing_requests(&self) -> &BTreeSet<UserId> {
        &self.outgoing_requests
    }

    /// `incoming_requests` set
    pub fn incoming_requests(&self) -> &BTreeSet<UserId> {
        &self.incoming_requests
    }

    /// Apply a single set mutation to this record
    ///
    /// Returns whether the set changed. Re-applying a mutation is a no-op.
    pub fn apply(&mut self, mutation: &SetMutation) -> bool {
        match *mutation {
            SetMutation::Add(set, id) => self.set_mut(set).insert(id),
            SetMutation::Remove(set, id) => self.set_mut(set).remove(&id),
        }
    }

    fn set_ref(&self, set: RelationSet) -> &BTreeSet<UserId> {
        match set {
            RelationSet::Friends => &self.friends,
            RelationSet::OutgoingRequests => &self.outgoing_requests,
            RelationSet::IncomingRequests => &self.incoming_requests,
        }
    }

    fn set_mut(&mut self, set: RelationSet) -> &mut BTreeSet<UserId> {
        match set {
            RelationSet::Friends => &mut self.friends,
            RelationSet::OutgoingRequests => &mut self.outgoing_requests,
            RelationSet::IncomingRequests => &mut self.incoming_requests,
        }
    }
}
