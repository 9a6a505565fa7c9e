use crate::{
    composer::ComposeError,
    photo::PhotoUploadError,
    session::{SharedWall, WallError},
};
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use json::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use wall_common::model::photo::InvalidPhotoError;

mod json;
mod routes;
mod upload;

pub type ServerRouter = Router<ServerState>;

/// Largest request body accepted. Above the photo limit so oversized photos get a
/// proper validation error.
pub const REQUEST_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub wall: SharedWall,
}

pub fn routes() -> ServerRouter {
    routes::routes()
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("The upload had no `photo` field")]
    MissingPhoto,
    #[error(transparent)]
    Wall(#[from] WallError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(rejection) => rejection.status(),
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(err) => err.status(),
            ServerError::MissingPhoto => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Wall(err) => wall_status(err),
        }
    }
}

fn wall_status(err: &WallError) -> StatusCode {
    match err {
        WallError::Compose(ComposeError::Empty | ComposeError::Message(_))
        | WallError::Photo(PhotoUploadError::Invalid(InvalidPhotoError::MissingFileName)) => {
            StatusCode::BAD_REQUEST
        }
        WallError::Photo(PhotoUploadError::Invalid(InvalidPhotoError::TooLarge { .. })) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        WallError::Photo(PhotoUploadError::Invalid(InvalidPhotoError::UnsupportedType(_))) => {
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        }
        WallError::Feed(_)
        | WallError::Profile(_)
        | WallError::Compose(ComposeError::Write(_))
        | WallError::Photo(PhotoUploadError::Upload(_)) => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
