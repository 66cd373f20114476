use crate::db::{mirror::MIRROR_SCHEMA, INIT_SCHEMA};
use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    sqlx::raw_sql(INIT_SCHEMA).execute(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}

pub async fn run_mirror_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running analytics mirror migrations...");

    sqlx::raw_sql(MIRROR_SCHEMA).execute(pool).await?;

    Ok(())
}
