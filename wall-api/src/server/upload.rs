use crate::server::ServerError;
use axum::extract::{FromRequest, Multipart, Request};
use tracing::debug;
use wall_common::model::photo::PhotoFile;

/// Name of the multipart field carrying the photo.
pub const PHOTO_FIELD: &str = "photo";

/// The `photo` field of a multipart upload. Other fields are skipped.
#[derive(Clone, Debug)]
pub struct PhotoUpload(pub PhotoFile);

impl<S: Send + Sync> FromRequest<S> for PhotoUpload {
    type Rejection = ServerError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state).await?;

        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some(PHOTO_FIELD) {
                debug!(field = ?field.name(), "Skipping multipart field");
                continue;
            }

            let file_name = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field.bytes().await?;

            return Ok(Self(PhotoFile {
                file_name,
                content_type,
                bytes,
            }));
        }

        Err(ServerError::MissingPhoto)
    }
}
