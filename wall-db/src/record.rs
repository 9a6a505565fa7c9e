use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;
use wall_common::model::{
    ModelValidationError,
    photo::PhotoUrl,
    post::{Post, PostMessage},
    profile::{Profile, ProfileDetails},
};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub message: String,
    pub photo_url: Option<String>,
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct ProfileRecord {
    pub id: Uuid,
    pub name: Option<String>,
    pub information: Option<String>,
    pub networks: Option<String>,
    pub current_city: Option<String>,
    pub photo_url: Option<String>,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author_id: value.author_id.into(),
            message: PostMessage::new(value.message)?,
            photo_url: value
                .photo_url
                .filter(|url| !url.is_empty())
                .map(PhotoUrl::new)
                .transpose()?,
            timestamp: value.timestamp,
        })
    }
}

/// Converts fetched rows, skipping the ones that no longer pass validation so a single
/// bad row cannot hide the rest of the feed.
pub(crate) fn readable_posts(records: Vec<PostRecord>) -> Vec<Post> {
    records
        .into_iter()
        .filter_map(|record| {
            let post_id = record.id;
            Post::try_from(record)
                .inspect_err(|err| warn!(error = %err, %post_id, "Skipping unreadable post"))
                .ok()
        })
        .collect()
}

impl From<ProfileRecord> for Profile {
    fn from(value: ProfileRecord) -> Self {
        Self {
            id: value.id.into(),
            details: ProfileDetails::with_fallbacks(
                value.name,
                value.information,
                value.networks,
                value.current_city,
                value.photo_url,
            ),
            updated_at: value.updated_at,
        }
    }
}
