use crate::server::ServerRouter;
use axum::Router;

mod composer;
mod feed;
mod profile;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(feed::routes())
        .merge(composer::routes())
        .merge(profile::routes())
}
