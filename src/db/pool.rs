use std::time::Duration;

use anyhow::Context;
use sqlx::{Pool, Postgres};
use sqlx::postgres::PgPoolOptions;
use crate::config::Config;

pub async fn get_db_pool(config: &Config) -> anyhow::Result<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}
