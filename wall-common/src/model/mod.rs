pub mod photo;
pub mod post;
pub mod profile;

use crate::model::{photo::InvalidPhotoUrlError, post::InvalidPostMessageError};
use derive_where::derive_where;
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    str::FromStr,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    PostMessage(#[from] InvalidPostMessageError),
    #[error(transparent)]
    PhotoUrl(#[from] InvalidPhotoUrlError),
}

/// A UUID tagged with the kind of record it identifies.
#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Id<Marker>(Uuid, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    /// Generates a fresh random (v4) identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }

    #[must_use]
    pub fn get(self) -> Uuid {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self::new)
    }
}

impl<Marker> From<Uuid> for Id<Marker> {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for Uuid {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker, profile::ProfileMarker};
    use uuid::{Uuid, uuid};

    #[test]
    fn generated_ids_are_distinct() {
        let first = Id::<PostMarker>::generate();
        let second = Id::<PostMarker>::generate();

        assert_ne!(first, second);
        assert_ne!(first.get(), Uuid::nil());
    }

    #[test]
    fn id_serializes_as_plain_uuid() {
        let id = Id::<ProfileMarker>::new(uuid!("550e8400-e29b-41d4-a716-446655440000"));

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");

        let parsed: Id<ProfileMarker> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(
            "550e8400-e29b-41d4-a716-446655440000"
                .parse::<Id<ProfileMarker>>()
                .unwrap(),
            id
        );
    }
}
