use crate::{
    server::ServerState,
    session::{SharedWall, Wall, follow_profile},
};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use wall_common::{
    identity::FixedIdentity,
    model::{Id, profile::ProfileMarker},
};
use wall_db::{
    backend::{BackendError, PhotoStore, WallBackend},
    client::{DbClient, DbError},
    memory::MemoryBackend,
    storage::{DEFAULT_PHOTO_BUCKET, StorageClient, StorageError},
};

mod composer;
mod feed;
mod photo;
mod profile;
mod server;
mod session;

const MAX_DB_CONNECTIONS: u32 = 5;

const DEFAULT_LOG_FILTER: &str = "wall_api=debug,wall_db=debug,wall_common=debug,\
    tower_http=debug,axum::rejection=trace,sqlx=warn";

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to the database: {0}")]
    DbConnect(#[source] sqlx::Error),
    #[error("Error preparing the database: {0}")]
    Db(#[from] DbError),
    #[error("The backend did not answer: {0}")]
    Backend(#[from] BackendError),
    #[error("DATABASE_URL is set, but {0} is missing")]
    MissingStorageConfig(&'static str),
    #[error("Error parsing STORAGE_URL: {0}")]
    StorageUrl(#[from] url::ParseError),
    #[error("Error setting up photo storage: {0}")]
    Storage(#[from] StorageError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    storage_url: Option<String>,
    storage_key: Option<String>,
    #[serde(default = "default_storage_bucket")]
    storage_bucket: String,
    profile_id: Option<Id<ProfileMarker>>,
}

fn default_storage_bucket() -> String {
    DEFAULT_PHOTO_BUCKET.to_owned()
}

struct Backends {
    wall: Arc<dyn WallBackend>,
    photos: Arc<dyn PhotoStore>,
}

fn install_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

impl Env {
    /// Reads `.env` when there is one, then the process environment.
    fn load() -> Result<Self, InitError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(err) if err.not_found() => debug!("No .env file found"),
            Err(err) => return Err(err.into()),
        }

        Ok(envy::from_env()?)
    }
}

async fn connect_backends(env: &Env) -> Result<Backends, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping the wall in memory");
        let backend = Arc::new(MemoryBackend::new());
        return Ok(Backends {
            wall: backend.clone(),
            photos: backend,
        });
    };

    let storage_url = env
        .storage_url
        .as_deref()
        .ok_or(InitError::MissingStorageConfig("STORAGE_URL"))?;
    let storage_key = env
        .storage_key
        .clone()
        .ok_or(InitError::MissingStorageConfig("STORAGE_KEY"))?;

    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(database_url)
        .await
        .map_err(InitError::DbConnect)?;
    let db_client = DbClient::new(pool);
    db_client.migrate().await?;
    info!("Connected to the database");

    let storage = StorageClient::new(
        reqwest::Client::new(),
        Url::parse(storage_url)?,
        env.storage_bucket.clone(),
        storage_key,
    )?;
    info!(bucket = storage.bucket(), "Using photo storage");

    Ok(Backends {
        wall: Arc::new(db_client),
        photos: Arc::new(storage),
    })
}

/// Starts applying realtime profile updates to `wall`. The wall keeps working without
/// them if subscribing fails.
async fn spawn_profile_follower(wall: &SharedWall) -> Option<JoinHandle<()>> {
    let subscription = match wall.lock().await.profile.subscribe().await {
        Ok(subscription) => subscription,
        Err(err) => {
            error!(error = %err, "Realtime profile updates are unavailable");
            return None;
        }
    };

    Some(tokio::spawn(follow_profile(Arc::clone(wall), subscription)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Listening for ctrl-c failed");
        std::future::pending::<()>().await;
    }

    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = Env::load()?;

    let backends = connect_backends(&env).await?;
    backends.wall.ping().await?;
    let identity = env
        .profile_id
        .map_or_else(FixedIdentity::default, FixedIdentity::new);

    let mut wall = Wall::new(backends.wall, backends.photos, Arc::new(identity));
    if let Err(err) = wall.load().await {
        error!(error = %err, "Initial load failed, serving what could be loaded");
    }
    let wall: SharedWall = Arc::new(Mutex::new(wall));
    let follower = spawn_profile_follower(&wall).await;

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes()
        .layer(tracing_layer)
        .with_state(ServerState { wall });

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Serving the wall");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    if let Some(follower) = follower {
        follower.abort();
        let _ = follower.await;
        debug!("Released the profile subscription");
    }

    Ok(())
}
