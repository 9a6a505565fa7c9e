use crate::backend::{self, PhotoStore};
use async_trait::async_trait;
use reqwest::{
    Client as HttpClient, StatusCode, Url,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use thiserror::Error;
use tracing::{debug, error};
use wall_common::model::photo::{InvalidPhotoUrlError, PhotoUrl, StoragePath, ValidatedPhoto};

pub const DEFAULT_PHOTO_BUCKET: &str = "wall-photos";

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("The storage endpoint cannot be used as a base url: {0}")]
    InvalidEndpoint(Url),
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Storage rejected the upload with status {status}: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    PhotoUrl(#[from] InvalidPhotoUrlError),
}

/// Client for a bucket of a hosted object storage REST API.
#[derive(Clone, Debug)]
pub struct StorageClient {
    http_client: HttpClient,
    endpoint: Url,
    bucket: String,
    api_key: String,
}

impl StorageClient {
    pub fn new(
        http_client: HttpClient,
        endpoint: Url,
        bucket: String,
        api_key: String,
    ) -> Result<Self> {
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::InvalidEndpoint(endpoint));
        }

        Ok(Self {
            http_client,
            endpoint,
            bucket,
            api_key,
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, prefix: &[&str], path: &StoragePath) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::InvalidEndpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .extend(prefix)
            .push(&self.bucket)
            .extend(path.segments());

        Ok(url)
    }

    pub async fn upload(&self, path: &StoragePath, photo: &ValidatedPhoto) -> Result<()> {
        let url = self.object_url(&["object"], path)?;
        debug!(%path, size = photo.len(), "Uploading photo");

        let response = self
            .http_client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .header(CONTENT_TYPE, photo.content_type().mime())
            .header("x-upsert", "false")
            .body(photo.bytes().clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(%path, %status, %message, "Photo upload was rejected");
            return Err(StorageError::Rejected { status, message });
        }

        Ok(())
    }

    pub fn public_url(&self, path: &StoragePath) -> Result<PhotoUrl> {
        let url = self.object_url(&["object", "public"], path)?;
        Ok(PhotoUrl::new(url.into())?)
    }
}

#[async_trait]
impl PhotoStore for StorageClient {
    async fn upload(&self, path: &StoragePath, photo: &ValidatedPhoto) -> backend::Result<()> {
        Ok(StorageClient::upload(self, path, photo).await?)
    }

    fn public_url(&self, path: &StoragePath) -> backend::Result<PhotoUrl> {
        Ok(StorageClient::public_url(self, path)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{DEFAULT_PHOTO_BUCKET, StorageClient, StorageError};
    use reqwest::{Client, Url};
    use uuid::uuid;
    use wall_common::model::photo::StoragePath;

    fn client(endpoint: &str) -> StorageClient {
        StorageClient::new(
            Client::new(),
            Url::parse(endpoint).unwrap(),
            DEFAULT_PHOTO_BUCKET.to_owned(),
            "anon-key".to_owned(),
        )
        .unwrap()
    }

    #[test]
    fn public_url_points_into_public_bucket() {
        let path = StoragePath::with_token(
            uuid!("67e55044-10b1-426f-9247-bb680e5fe0c8"),
            "my cat.png",
        );

        for endpoint in [
            "https://project.example.co/storage/v1",
            "https://project.example.co/storage/v1/",
        ] {
            let url = client(endpoint).public_url(&path).unwrap();
            assert_eq!(
                url.get(),
                "https://project.example.co/storage/v1/object/public/wall-photos/public/\
                 67e55044-10b1-426f-9247-bb680e5fe0c8-my%20cat.png"
            );
        }
    }

    #[test]
    fn upload_url_targets_bucket() {
        let path = StoragePath::with_token(
            uuid!("67e55044-10b1-426f-9247-bb680e5fe0c8"),
            "cat.png",
        );

        let url = client("https://project.example.co/storage/v1")
            .object_url(&["object"], &path)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.example.co/storage/v1/object/wall-photos/public/\
             67e55044-10b1-426f-9247-bb680e5fe0c8-cat.png"
        );
    }

    #[test]
    fn rejects_endpoint_that_cannot_be_a_base() {
        let result = StorageClient::new(
            Client::new(),
            Url::parse("mailto:photos@example.com").unwrap(),
            DEFAULT_PHOTO_BUCKET.to_owned(),
            "anon-key".to_owned(),
        );

        assert!(matches!(result, Err(StorageError::InvalidEndpoint(_))));
    }
}
