use crate::model::Id;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const DEFAULT_PROFILE_NAME: &str = "Wall Owner";
pub const DEFAULT_PROFILE_PHOTO: &str = "/placeholder.jpg";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ProfileMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Profile {
    pub id: Id<ProfileMarker>,
    #[serde(flatten)]
    pub details: ProfileDetails,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The user-editable part of a profile. Always saved as a whole.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ProfileDetails {
    pub name: String,
    pub information: String,
    pub networks: String,
    pub current_city: String,
    pub photo_url: String,
}

/// New field values pushed by a realtime update. Any field may be absent.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct ProfileChange {
    pub name: Option<String>,
    pub information: Option<String>,
    pub networks: Option<String>,
    pub current_city: Option<String>,
    pub photo_url: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn new(id: Id<ProfileMarker>, details: ProfileDetails) -> Self {
        Self {
            id,
            details,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// The record created the first time an unknown profile is loaded.
    #[must_use]
    pub fn with_defaults(id: Id<ProfileMarker>) -> Self {
        Self::new(id, ProfileDetails::default())
    }
}

impl Default for ProfileDetails {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE_NAME.to_owned(),
            information: String::new(),
            networks: String::new(),
            current_city: String::new(),
            photo_url: DEFAULT_PROFILE_PHOTO.to_owned(),
        }
    }
}

impl ProfileDetails {
    /// Fills every missing or empty field with its default.
    #[must_use]
    pub fn with_fallbacks(
        name: Option<String>,
        information: Option<String>,
        networks: Option<String>,
        current_city: Option<String>,
        photo_url: Option<String>,
    ) -> Self {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_owned())
        }

        Self {
            name: or_default(name, DEFAULT_PROFILE_NAME),
            information: information.unwrap_or_default(),
            networks: networks.unwrap_or_default(),
            current_city: current_city.unwrap_or_default(),
            photo_url: or_default(photo_url, DEFAULT_PROFILE_PHOTO),
        }
    }

    /// Replaces empty name and photo with their defaults.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::with_fallbacks(
            Some(self.name),
            Some(self.information),
            Some(self.networks),
            Some(self.current_city),
            Some(self.photo_url),
        )
    }

    /// Overwrites every field from a realtime change; fields absent from the change
    /// are reset to their defaults rather than kept.
    pub fn apply(&mut self, change: ProfileChange) {
        *self = change.into();
    }
}

impl From<ProfileChange> for ProfileDetails {
    fn from(value: ProfileChange) -> Self {
        Self::with_fallbacks(
            value.name,
            value.information,
            value.networks,
            value.current_city,
            value.photo_url,
        )
    }
}

impl From<ProfileDetails> for ProfileChange {
    fn from(value: ProfileDetails) -> Self {
        Self {
            name: Some(value.name),
            information: Some(value.information),
            networks: Some(value.networks),
            current_city: Some(value.current_city),
            photo_url: Some(value.photo_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::profile::{
        DEFAULT_PROFILE_NAME, DEFAULT_PROFILE_PHOTO, ProfileChange, ProfileDetails,
    };

    #[test]
    fn change_overwrites_every_field() {
        let mut details = ProfileDetails {
            name: "Ada".to_owned(),
            information: "Engineer".to_owned(),
            networks: "Mastodon".to_owned(),
            current_city: "London".to_owned(),
            photo_url: "https://cdn.example/ada.png".to_owned(),
        };

        details.apply(ProfileChange {
            name: Some("Grace".to_owned()),
            information: None,
            networks: Some("Forums".to_owned()),
            current_city: None,
            photo_url: None,
        });

        assert_eq!(
            details,
            ProfileDetails {
                name: "Grace".to_owned(),
                information: String::new(),
                networks: "Forums".to_owned(),
                current_city: String::new(),
                photo_url: DEFAULT_PROFILE_PHOTO.to_owned(),
            }
        );
    }

    #[test]
    fn empty_name_and_photo_fall_back_to_defaults() {
        let details = ProfileDetails::with_fallbacks(
            Some(String::new()),
            Some(String::new()),
            None,
            Some("Palo Alto, CA".to_owned()),
            Some(String::new()),
        );

        assert_eq!(details.name, DEFAULT_PROFILE_NAME);
        assert_eq!(details.photo_url, DEFAULT_PROFILE_PHOTO);
        assert_eq!(details.current_city, "Palo Alto, CA");
        assert!(details.information.is_empty());

        let stored = ProfileDetails {
            name: String::new(),
            ..ProfileDetails::default()
        };
        assert_eq!(stored.normalized(), ProfileDetails::default());
    }

    #[test]
    fn change_from_stored_details_restores_them() {
        let stored = ProfileDetails {
            name: "Ada".to_owned(),
            information: "x".repeat(9000),
            ..ProfileDetails::default()
        };

        let mut local = ProfileDetails::default();
        local.apply(ProfileChange::from(stored.clone()));

        assert_eq!(local, stored);
    }

    #[test]
    fn change_payload_tolerates_nulls_and_missing_keys() {
        let change: ProfileChange =
            serde_json::from_str(r#"{"name": null, "networks": "LinkedIn"}"#).unwrap();

        assert_eq!(
            ProfileDetails::from(change),
            ProfileDetails {
                networks: "LinkedIn".to_owned(),
                ..ProfileDetails::default()
            }
        );
    }
}
