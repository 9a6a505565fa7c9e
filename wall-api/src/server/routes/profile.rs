use crate::{
    profile::ProfileView,
    server::{Result, ServerError, ServerRouter, json::Json, upload::PhotoUpload},
    session::{self, SharedWall, WallError},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use wall_common::model::profile::ProfileDetails;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_profile)
        .typed_put(save_profile)
        .typed_post(begin_edit)
        .typed_post(change_photo)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile", rejection(ServerError))]
struct ProfilePath();

async fn get_profile(
    ProfilePath(): ProfilePath,
    State(wall): State<SharedWall>,
) -> Json<ProfileView> {
    Json(wall.lock().await.profile.view())
}

async fn save_profile(
    ProfilePath(): ProfilePath,
    State(wall): State<SharedWall>,
    Json(details): Json<ProfileDetails>,
) -> Result<Json<ProfileView>> {
    let mut wall = wall.lock().await;
    wall.profile.save(details).await.map_err(WallError::from)?;

    Ok(Json(wall.profile.view()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/edit", rejection(ServerError))]
struct EditProfilePath();

async fn begin_edit(
    EditProfilePath(): EditProfilePath,
    State(wall): State<SharedWall>,
) -> Json<ProfileView> {
    let mut wall = wall.lock().await;
    wall.profile.begin_edit();

    Json(wall.profile.view())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/photo", rejection(ServerError))]
struct ProfilePhotoPath();

async fn change_photo(
    ProfilePhotoPath(): ProfilePhotoPath,
    State(wall): State<SharedWall>,
    PhotoUpload(file): PhotoUpload,
) -> Result<Json<ProfileView>> {
    Ok(Json(session::change_profile_photo(&wall, file).await?))
}
