use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use wall_common::model::photo::{InvalidPhotoError, PhotoFile, PhotoUrl, StoragePath};
use wall_db::backend::{BackendError, PhotoStore};

#[derive(Debug, Error)]
pub enum PhotoUploadError {
    #[error(transparent)]
    Invalid(#[from] InvalidPhotoError),
    #[error("Uploading the photo failed: {0}")]
    Upload(#[from] BackendError),
}

#[derive(Clone)]
pub struct PhotoUploader {
    store: Arc<dyn PhotoStore>,
}

impl PhotoUploader {
    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self { store }
    }

    /// Checks the file, stores it under a fresh path and returns its public url.
    ///
    /// Invalid files never reach the store.
    pub async fn upload(&self, file: PhotoFile) -> Result<PhotoUrl, PhotoUploadError> {
        let photo = file.validate()?;
        let path = StoragePath::generate(photo.file_name());

        if let Err(err) = self.store.upload(&path, &photo).await {
            error!(error = %err, %path, "Photo upload failed");
            return Err(err.into());
        }

        let url = self.store.public_url(&path)?;
        info!(%path, %url, size = photo.len(), "Uploaded photo");

        Ok(url)
    }
}
