//! Error types for relationship operations

use quire_domain::UserId;
use thiserror::Error;

/// Coarse error taxonomy shared by every relationship operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No resolvable principal
    Unauthenticated,
    /// Missing or malformed id, or a self-targeted operation
    Validation,
    /// Referenced identity absent
    NotFound,
    /// The pair is not in a state that allows the operation
    StateConflict,
    /// Store unavailable or timed out
    Internal,
}

/// Errors that can occur during relationship operations
///
/// Every variant except [`SocialError::Internal`] is stable and safe to show
/// to the caller. Internal errors carry an opaque message only; the store
/// detail is logged where the failure happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocialError {
    /// No authenticated principal
    #[error("Authentication required")]
    Unauthenticated,

    /// Missing or malformed input
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Referenced identity does not exist
    #[error("Identity not found: {0}")]
    NotFound(UserId),

    /// The pair are already friends
    #[error("Already friends")]
    AlreadyFriends,

    /// The principal already has a pending request to the target
    #[error("Friend request already sent")]
    RequestAlreadySent,

    /// The target already requested the principal
    #[error("This user already sent you a friend request; accept it instead")]
    ReciprocalRequestExists,

    /// No matching pending request on both records
    #[error("No matching pending friend request")]
    InvalidRequestState,

    /// Accept on a pair that is already friends
    #[error("Already friends; stale request state was cleared")]
    AlreadyFriendsConflict,

    /// Operation targets the principal itself
    #[error("Cannot perform this operation on yourself")]
    InvalidSelfOperation,

    /// Store failure or timeout
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SocialError {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SocialError::Unauthenticated => ErrorKind::Unauthenticated,
            SocialError::Validation(_) | SocialError::InvalidSelfOperation => ErrorKind::Validation,
            SocialError::NotFound(_) => ErrorKind::NotFound,
            SocialError::AlreadyFriends
            | SocialError::RequestAlreadySent
            | SocialError::ReciprocalRequestExists
            | SocialError::InvalidRequestState
            | SocialError::AlreadyFriendsConflict => ErrorKind::StateConflict,
            SocialError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SocialError::Unauthenticated => "unauthenticated",
            SocialError::Validation(_) => "validation",
            SocialError::NotFound(_) => "not_found",
            SocialError::AlreadyFriends => "already_friends",
            SocialError::RequestAlreadySent => "request_already_sent",
            SocialError::ReciprocalRequestExists => "reciprocal_request_exists",
            SocialError::InvalidRequestState => "invalid_request_state",
            SocialError::AlreadyFriendsConflict => "already_friends_conflict",
            SocialError::InvalidSelfOperation => "invalid_self_operation",
            SocialError::Internal(_) => "internal",
        }
    }
}
