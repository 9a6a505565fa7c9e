use crate::{
    composer::Draft,
    server::{
        Result, ServerError, ServerRouter,
        json::{Created, Json},
        upload::PhotoUpload,
    },
    session::{self, SharedWall},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use wall_common::model::post::Post;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_draft)
        .typed_put(set_draft_text)
        .typed_post(attach_photo)
        .typed_post(submit_draft)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct DraftView {
    #[serde(flatten)]
    draft: Draft,
    remaining_characters: usize,
}

impl From<&Draft> for DraftView {
    fn from(draft: &Draft) -> Self {
        Self {
            draft: draft.clone(),
            remaining_characters: draft.remaining_characters(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct DraftText {
    text: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/composer", rejection(ServerError))]
struct ComposerPath();

async fn get_draft(
    ComposerPath(): ComposerPath,
    State(wall): State<SharedWall>,
) -> Json<DraftView> {
    Json(wall.lock().await.composer.draft().into())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/composer/text", rejection(ServerError))]
struct DraftTextPath();

async fn set_draft_text(
    DraftTextPath(): DraftTextPath,
    State(wall): State<SharedWall>,
    Json(DraftText { text }): Json<DraftText>,
) -> Json<DraftView> {
    let mut wall = wall.lock().await;
    wall.composer.set_text(&text);

    Json(wall.composer.draft().into())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/composer/photo", rejection(ServerError))]
struct DraftPhotoPath();

async fn attach_photo(
    DraftPhotoPath(): DraftPhotoPath,
    State(wall): State<SharedWall>,
    PhotoUpload(file): PhotoUpload,
) -> Result<Json<DraftView>> {
    session::attach_post_photo(&wall, file).await?;

    Ok(Json(wall.lock().await.composer.draft().into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/composer/submit", rejection(ServerError))]
struct SubmitPath();

async fn submit_draft(
    SubmitPath(): SubmitPath,
    State(wall): State<SharedWall>,
) -> Result<Created<Post>> {
    let post = wall.lock().await.submit_post().await?;

    Ok(Created(post))
}
