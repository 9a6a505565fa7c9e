//! Throwaway Postgres schemas for tests against a real database.
//!
//! Each test gets its own schema on `DATABASE_URL`, so tests can run in parallel
//! without seeing each other's rows. Without `DATABASE_URL` these tests are skipped.

use crate::client::DbClient;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
    query, query_scalar,
};
use std::str::FromStr;
use uuid::Uuid;

pub struct TestDb {
    pub client: DbClient,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    /// Creates a fresh schema and runs the migrations in it, or returns `None` when no
    /// database is configured.
    pub async fn connect() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL is not set, skipping database test");
            return None;
        };

        let schema = format!("wall_test_{}", Uuid::new_v4().simple());
        let admin = PgPool::connect(&url).await.unwrap();
        query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await
            .unwrap();

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .application_name(&schema)
            .options([("search_path", schema.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .unwrap();

        let client = DbClient::new(pool);
        client.migrate().await.unwrap();

        Some(Self {
            client,
            admin,
            schema,
        })
    }

    /// Connections of this schema's pools currently sitting in a `LISTEN`.
    pub async fn listening_connections(&self) -> i64 {
        query_scalar(
            "
            SELECT
                count(*)
            FROM
                pg_stat_activity
            WHERE
                application_name = $1
                AND query LIKE 'LISTEN%'
            ",
        )
        .bind(&self.schema)
        .fetch_one(&self.admin)
        .await
        .unwrap()
    }

    pub async fn drop_schema(self) {
        query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .unwrap();
    }
}
