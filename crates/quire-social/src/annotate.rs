//! Listing and search annotation
//!
//! Attaches the principal's relationship status to candidate lists that
//! come from elsewhere (directory search, browsing). Read-only.

use crate::error::SocialError;
use crate::service::RelationshipService;
use quire_domain::traits::IdentityStore;
use quire_domain::{derive_status, Identity, PublicProfile, RelationshipStatus, UserId};

/// A candidate profile tagged with the viewer's relationship status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedProfile {
    /// Candidate projection
    pub profile: PublicProfile,

    /// Status as seen by the viewer
    pub status: RelationshipStatus,
}

/// Tag each candidate with `viewer`'s status toward it
///
/// The viewer itself is dropped from the result.
pub fn annotate_with(viewer: &Identity, candidates: Vec<PublicProfile>) -> Vec<AnnotatedProfile> {
    candidates
        .into_iter()
        .filter(|profile| profile.id != viewer.id)
        .map(|profile| AnnotatedProfile {
            status: derive_status(viewer, profile.id),
            profile,
        })
        .collect()
}

impl<S: IdentityStore> RelationshipService<S> {
    /// Annotate an externally produced candidate list for `principal`
    pub async fn annotate(
        &self,
        principal: UserId,
        candidates: Vec<PublicProfile>,
    ) -> Result<Vec<AnnotatedProfile>, SocialError> {
        let viewer = self.principal_record("annotate", principal).await?;
        Ok(annotate_with(&viewer, candidates))
    }

    /// Directory search annotated with the principal's status toward each hit
    ///
    /// `limit` is capped by the configured maximum.
    pub async fn search(
        &self,
        principal: UserId,
        text: &str,
        limit: usize,
    ) -> Result<Vec<AnnotatedProfile>, SocialError> {
        let limit = limit.min(self.config().max_search_results).max(1);
        let viewer = self.principal_record("search", principal).await?;
        // One extra row so dropping the viewer does not shorten the page
        let hits = self.directory_search(principal, text, limit + 1).await?;

        let mut annotated = annotate_with(&viewer, hits);
        annotated.truncate(limit);
        Ok(annotated)
    }
}
