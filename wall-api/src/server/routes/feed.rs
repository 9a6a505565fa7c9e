use crate::{
    server::{Result, ServerError, ServerRouter, json::Json},
    session::{SharedWall, WallError},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use wall_common::model::post::FeedEntry;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_feed)
        .typed_post(refresh_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed", rejection(ServerError))]
struct FeedPath();

async fn get_feed(
    FeedPath(): FeedPath,
    State(wall): State<SharedWall>,
) -> Json<Vec<FeedEntry>> {
    Json(wall.lock().await.feed.entries().to_vec())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed/refresh", rejection(ServerError))]
struct RefreshFeedPath();

async fn refresh_feed(
    RefreshFeedPath(): RefreshFeedPath,
    State(wall): State<SharedWall>,
) -> Result<Json<Vec<FeedEntry>>> {
    let mut wall = wall.lock().await;
    let entries = wall.feed.refresh().await.map_err(WallError::from)?;

    Ok(Json(entries.to_vec()))
}
