//! Who the wall belongs to.
//!
//! There is no sign-in: a single fixed profile id stands in for the current user.
//! Stores only ever ask an [`IdentityProvider`], so a real one can replace it.

use crate::model::{Id, profile::ProfileMarker};
use uuid::uuid;

/// Id of the single public profile.
pub const PUBLIC_PROFILE_ID: Id<ProfileMarker> =
    Id::new(uuid!("550e8400-e29b-41d4-a716-446655440000"));

pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Id<ProfileMarker>;
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct FixedIdentity(Id<ProfileMarker>);

impl FixedIdentity {
    #[must_use]
    pub fn new(id: Id<ProfileMarker>) -> Self {
        Self(id)
    }
}

impl Default for FixedIdentity {
    fn default() -> Self {
        Self(PUBLIC_PROFILE_ID)
    }
}

impl IdentityProvider for FixedIdentity {
    fn current(&self) -> Id<ProfileMarker> {
        self.0
    }
}
