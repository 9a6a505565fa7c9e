use crate::{
    backend::{self, WallBackend},
    realtime::{self, ProfileSubscription},
    record::{PostRecord, ProfileRecord, readable_posts},
};
use async_trait::async_trait;
use sqlx::{PgPool, migrate::MigrateError, query, query_as, query_scalar};
use thiserror::Error;
use tracing::debug;
use wall_common::model::{
    Id,
    post::Post,
    profile::{Profile, ProfileMarker},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn fetch_recent_posts(&self, limit: u32) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.author_id,
                posts.message,
                posts.photo_url,
                posts.timestamp
            FROM
                posts
            ORDER BY
                posts.timestamp DESC
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(readable_posts(records))
    }

    pub async fn fetch_profile_name(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> Result<Option<String>> {
        let name = query_scalar::<_, Option<String>>(
            "
            SELECT
                profiles.name
            FROM
                profiles
            WHERE
                profiles.id = $1
            ",
        )
        .bind(profile_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(name.flatten())
    }

    pub async fn insert_post(&self, post: &Post) -> Result<()> {
        query(
            "
            INSERT INTO posts (id, author_id, message, photo_url, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(post.id.get())
        .bind(post.author_id.get())
        .bind(post.message.get())
        .bind(post.photo_url.as_ref().map(|url| url.get()))
        .bind(post.timestamp)
        .execute(&self.pool)
        .await?;

        debug!(post_id = %post.id, "Inserted post");
        Ok(())
    }

    pub async fn fetch_profile(&self, profile_id: Id<ProfileMarker>) -> Result<Option<Profile>> {
        let record = query_as::<_, ProfileRecord>(
            "
            SELECT
                profiles.id,
                profiles.name,
                profiles.information,
                profiles.networks,
                profiles.current_city,
                profiles.photo_url,
                profiles.updated_at
            FROM
                profiles
            WHERE
                profiles.id = $1
            ",
        )
        .bind(profile_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Profile::from))
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let details = &profile.details;

        query(
            "
            INSERT INTO profiles
                (id, name, information, networks, current_city, photo_url, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                information = EXCLUDED.information,
                networks = EXCLUDED.networks,
                current_city = EXCLUDED.current_city,
                photo_url = EXCLUDED.photo_url,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(profile.id.get())
        .bind(&details.name)
        .bind(&details.information)
        .bind(&details.networks)
        .bind(&details.current_city)
        .bind(&details.photo_url)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(profile_id = %profile.id, "Upserted profile");
        Ok(())
    }

    pub async fn subscribe_profile(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> Result<ProfileSubscription> {
        let subscription = realtime::listen(self, profile_id).await?;
        Ok(subscription)
    }
}

#[async_trait]
impl WallBackend for DbClient {
    async fn ping(&self) -> backend::Result<()> {
        Ok(DbClient::ping(self).await?)
    }

    async fn fetch_recent_posts(&self, limit: u32) -> backend::Result<Vec<Post>> {
        Ok(DbClient::fetch_recent_posts(self, limit).await?)
    }

    async fn fetch_profile_name(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> backend::Result<Option<String>> {
        Ok(DbClient::fetch_profile_name(self, profile_id).await?)
    }

    async fn insert_post(&self, post: &Post) -> backend::Result<()> {
        Ok(DbClient::insert_post(self, post).await?)
    }

    async fn fetch_profile(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> backend::Result<Option<Profile>> {
        Ok(DbClient::fetch_profile(self, profile_id).await?)
    }

    async fn upsert_profile(&self, profile: &Profile) -> backend::Result<()> {
        Ok(DbClient::upsert_profile(self, profile).await?)
    }

    async fn subscribe_profile(
        &self,
        profile_id: Id<ProfileMarker>,
    ) -> backend::Result<ProfileSubscription> {
        Ok(DbClient::subscribe_profile(self, profile_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_db::TestDb;
    use sqlx::{query, query_scalar};
    use time::{Duration, macros::datetime};
    use uuid::Uuid;
    use wall_common::model::{
        Id,
        post::{Post, PostMessage},
        profile::{Profile, ProfileDetails},
    };

    fn post(message: &str, minutes: i64) -> Post {
        Post {
            timestamp: datetime!(2025-07-01 12:00 UTC) + Duration::minutes(minutes),
            ..Post::new(
                Id::generate(),
                PostMessage::new(message.to_owned()).unwrap(),
                None,
            )
        }
    }

    #[tokio::test]
    async fn missing_profile_is_created_once() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let client = &db.client;
        let id = Id::generate();

        assert_eq!(client.fetch_profile(id).await.unwrap(), None);
        client
            .upsert_profile(&Profile::with_defaults(id))
            .await
            .unwrap();
        let stored = client.fetch_profile(id).await.unwrap().unwrap();
        assert_eq!(stored.details, ProfileDetails::default());
        assert_eq!(
            client.fetch_profile_name(id).await.unwrap().as_deref(),
            Some(stored.details.name.as_str())
        );

        client.upsert_profile(&stored).await.unwrap();
        let rows: i64 = query_scalar("SELECT count(*) FROM profiles")
            .fetch_one(client.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(client.fetch_profile_name(Id::generate()).await.unwrap(), None);

        db.drop_schema().await;
    }

    #[tokio::test]
    async fn saved_profile_reloads_with_long_fields() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let client = &db.client;
        let id = Id::generate();
        client
            .upsert_profile(&Profile::with_defaults(id))
            .await
            .unwrap();

        let details = ProfileDetails {
            name: "Ada Lovelace".to_owned(),
            information: "x".repeat(9000),
            networks: "Royal Society".to_owned(),
            current_city: "London".to_owned(),
            photo_url: "https://cdn.example/ada.png".to_owned(),
        };
        client
            .upsert_profile(&Profile::new(id, details.clone()))
            .await
            .unwrap();

        let stored = client.fetch_profile(id).await.unwrap().unwrap();
        assert_eq!(stored.details, details);

        db.drop_schema().await;
    }

    #[tokio::test]
    async fn recent_posts_are_newest_first_and_capped() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let client = &db.client;
        for minutes in 0..55 {
            client
                .insert_post(&post(&format!("post {minutes}"), minutes))
                .await
                .unwrap();
        }

        let posts = client.fetch_recent_posts(50).await.unwrap();

        assert_eq!(posts.len(), 50);
        assert_eq!(posts[0].message.get(), "post 54");
        assert_eq!(posts[49].message.get(), "post 5");
        assert!(posts.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));

        db.drop_schema().await;
    }

    #[tokio::test]
    async fn overlong_stored_post_does_not_hide_the_feed() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let client = &db.client;
        let readable = post("fine", 0);
        client.insert_post(&readable).await.unwrap();
        query(
            "
            INSERT INTO posts (id, author_id, message, photo_url, timestamp)
            VALUES ($1, $2, $3, NULL, $4)
            ",
        )
        .bind(Uuid::new_v4())
        .bind(readable.author_id.get())
        .bind("y".repeat(300))
        .bind(readable.timestamp + Duration::minutes(1))
        .execute(client.pool())
        .await
        .unwrap();

        let posts = client.fetch_recent_posts(50).await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, readable.id);

        db.drop_schema().await;
    }
}
