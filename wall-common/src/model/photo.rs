use bytes::Bytes;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

/// Largest photo accepted for upload, in bytes.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Prefix of every uploaded object path.
pub const STORAGE_PATH_PREFIX: &str = "public";

/// Publicly fetchable reference to an uploaded photo.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PhotoUrl(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The photo url is empty")]
pub struct InvalidPhotoUrlError;

impl PhotoUrl {
    pub fn new(url: String) -> Result<Self, InvalidPhotoUrlError> {
        if url.is_empty() {
            Err(InvalidPhotoUrlError)
        } else {
            Ok(Self(url))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for PhotoUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PhotoUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PhotoUrl::new(inner).map_err(|_| Error::invalid_value(Unexpected::Str(""), &"PhotoUrl"))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ImageContentType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageContentType {
    pub const ALL: [ImageContentType; 4] = [Self::Jpeg, Self::Png, Self::Gif, Self::Webp];

    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|content_type| content_type.mime().eq_ignore_ascii_case(mime.trim()))
    }

    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum InvalidPhotoError {
    #[error("The photo is {size} bytes, the limit is {MAX_PHOTO_BYTES} bytes")]
    TooLarge { size: usize },
    #[error("The photo content type is not supported: {0}")]
    UnsupportedType(String),
    #[error("The photo has no file name")]
    MissingFileName,
}

/// A photo selected for upload, before it has been checked.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PhotoFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A photo that passed the size and content type checks.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ValidatedPhoto {
    file_name: String,
    content_type: ImageContentType,
    bytes: Bytes,
}

impl PhotoFile {
    /// Checks size first, so an oversized file is rejected whatever its type.
    pub fn validate(self) -> Result<ValidatedPhoto, InvalidPhotoError> {
        let size = self.bytes.len();
        if size > MAX_PHOTO_BYTES {
            return Err(InvalidPhotoError::TooLarge { size });
        }

        let content_type = ImageContentType::from_mime(&self.content_type)
            .ok_or(InvalidPhotoError::UnsupportedType(self.content_type))?;

        if self.file_name.trim().is_empty() {
            return Err(InvalidPhotoError::MissingFileName);
        }

        Ok(ValidatedPhoto {
            file_name: self.file_name,
            content_type,
            bytes: self.bytes,
        })
    }
}

impl ValidatedPhoto {
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn content_type(&self) -> ImageContentType {
        self.content_type
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Object path inside the photo bucket, `public/{token}-{file name}`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct StoragePath(String);

impl StoragePath {
    #[must_use]
    pub fn generate(file_name: &str) -> Self {
        Self::with_token(Uuid::new_v4(), file_name)
    }

    #[must_use]
    pub fn with_token(token: Uuid, file_name: &str) -> Self {
        let file_name = file_name.trim().replace(['/', '\\'], "_");
        Self(format!("{STORAGE_PATH_PREFIX}/{token}-{file_name}"))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl Display for StoragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
