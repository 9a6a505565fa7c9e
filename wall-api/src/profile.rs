use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use wall_common::{
    identity::IdentityProvider,
    model::{
        Id,
        photo::PhotoUrl,
        profile::{Profile, ProfileChange, ProfileDetails, ProfileMarker},
    },
};
use wall_db::{
    backend::{BackendError, WallBackend},
    realtime::ProfileSubscription,
};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Fetching the profile failed: {0}")]
    Fetch(#[source] BackendError),
    #[error("Saving the profile failed: {0}")]
    Save(#[source] BackendError),
    #[error("Subscribing to profile updates failed: {0}")]
    Subscribe(#[source] BackendError),
}

/// What the profile sidebar shows.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ProfileView {
    pub id: Id<ProfileMarker>,
    #[serde(flatten)]
    pub details: ProfileDetails,
    pub editing: bool,
}

/// Local copy of the current user's profile.
pub struct ProfileStore {
    backend: Arc<dyn WallBackend>,
    identity: Arc<dyn IdentityProvider>,
    details: ProfileDetails,
    editing: bool,
}

impl ProfileStore {
    pub fn new(backend: Arc<dyn WallBackend>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend,
            identity,
            details: ProfileDetails::default(),
            editing: false,
        }
    }

    pub fn id(&self) -> Id<ProfileMarker> {
        self.identity.current()
    }

    pub fn details(&self) -> &ProfileDetails {
        &self.details
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn view(&self) -> ProfileView {
        ProfileView {
            id: self.id(),
            details: self.details().clone(),
            editing: self.is_editing(),
        }
    }

    /// Loads the profile, creating it with default values the first time.
    pub async fn load(&mut self) -> Result<&ProfileDetails, ProfileError> {
        let id = self.id();

        let stored = self.backend.fetch_profile(id).await.map_err(|err| {
            error!(error = %err, profile_id = %id, "Profile fetch failed");
            ProfileError::Fetch(err)
        })?;

        match stored {
            Some(profile) => {
                debug!(profile_id = %id, "Loaded profile");
                self.details = profile.details.normalized();
            }
            None => {
                let profile = Profile::with_defaults(id);
                self.backend.upsert_profile(&profile).await.map_err(|err| {
                    error!(error = %err, profile_id = %id, "Creating default profile failed");
                    ProfileError::Save(err)
                })?;

                info!(profile_id = %id, "Created default profile");
                self.details = profile.details;
            }
        }

        Ok(&self.details)
    }

    /// Starts listening for updates to this profile. Dropping the subscription stops it.
    pub async fn subscribe(&self) -> Result<ProfileSubscription, ProfileError> {
        let id = self.id();
        self.backend
            .subscribe_profile(id)
            .await
            .map_err(ProfileError::Subscribe)
    }

    /// Replaces the local details with a realtime update.
    pub fn apply_change(&mut self, change: ProfileChange) {
        debug!(profile_id = %self.id(), "Applying realtime profile update");
        self.details.apply(change);
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
    }

    /// Saves the full record. Leaves edit mode only once the write succeeded.
    pub async fn save(
        &mut self,
        details: ProfileDetails,
    ) -> Result<&ProfileDetails, ProfileError> {
        self.persist(details).await?;
        self.editing = false;

        Ok(&self.details)
    }

    /// Saves the current details with a new photo.
    pub async fn replace_photo(
        &mut self,
        photo_url: PhotoUrl,
    ) -> Result<&ProfileDetails, ProfileError> {
        let details = ProfileDetails {
            photo_url: photo_url.into_inner(),
            ..self.details.clone()
        };
        self.persist(details).await?;

        Ok(&self.details)
    }

    async fn persist(&mut self, details: ProfileDetails) -> Result<(), ProfileError> {
        let profile = Profile::new(self.id(), details);

        if let Err(err) = self.backend.upsert_profile(&profile).await {
            error!(error = %err, profile_id = %profile.id, "Profile save failed");
            return Err(ProfileError::Save(err));
        }

        debug!(profile_id = %profile.id, "Saved profile");
        self.details = profile.details;
        Ok(())
    }
}
