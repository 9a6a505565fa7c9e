use crate::model::{
    Id,
    photo::PhotoUrl,
    profile::ProfileMarker,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_MESSAGE_MAX_LEN: usize = 280;

/// Display name used when a post's author cannot be resolved.
pub const UNKNOWN_AUTHOR_NAME: &str = "Unknown";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<ProfileMarker>,
    pub message: PostMessage,
    pub photo_url: Option<PhotoUrl>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A post joined with its author's display name, as shown in the feed.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub post: Post,
    pub author_name: String,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostMessage(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post message is longer than {POST_MESSAGE_MAX_LEN} characters: {0}")]
pub struct InvalidPostMessageError(String);

impl Post {
    /// Builds a new post with a fresh id, stamped with the current time.
    #[must_use]
    pub fn new(
        author_id: Id<ProfileMarker>,
        message: PostMessage,
        photo_url: Option<PhotoUrl>,
    ) -> Self {
        Self {
            id: Id::generate(),
            author_id,
            message,
            photo_url,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

impl FeedEntry {
    /// Joins a post with its author's name, substituting [`UNKNOWN_AUTHOR_NAME`] for a
    /// missing or empty one.
    #[must_use]
    pub fn new(post: Post, author_name: Option<String>) -> Self {
        let author_name = author_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR_NAME.to_owned());

        Self { post, author_name }
    }
}

impl PostMessage {
    pub fn new(message: String) -> Result<Self, InvalidPostMessageError> {
        if message.chars().count() <= POST_MESSAGE_MAX_LEN {
            Ok(PostMessage(message))
        } else {
            Err(InvalidPostMessageError(message))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for PostMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostMessage::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostMessage"))
    }
}
