use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{ConnectOptions, Pool, Postgres};
use tracing::log::LevelFilter;
use tracing::{event, Level};

#[derive(Clone)]
pub struct PgConnectionString(pub String);

impl PgConnectionString {
    pub fn get_schema_name_for_reset_date(&self, reset_date: &str) -> String {
        format!("reset_{}", reset_date.replace('-', "_"))
    }
}

pub async fn get_pg_connection_pool(connection_string: PgConnectionString) -> Result<Pool<Postgres>> {
    let database_connection_options: PgConnectOptions = connection_string
        .0
        .parse::<PgConnectOptions>()?
        .log_slow_statements(LevelFilter::Warn, Duration::from_secs(60));

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(database_connection_options)
        .await?;

    Ok(pool)
}

/// Probes the remote server's reset date against what this schema was last
/// prepared for. A reset invalidates every cached ship/market/FRM row, so the
/// previous `public` schema is archived under a reset-stamped name and a
/// fresh one is migrated in its place.
pub async fn prepare_schema(pool: &Pool<Postgres>, server_reset_date: &str, connection_string: &PgConnectionString) -> Result<()> {
    perform_migration(pool).await?;

    match load_status(pool).await? {
        None => {
            event!(Level::INFO, "no status row found for reset {server_reset_date}, seeding it");
            insert_status(pool, server_reset_date).await
        }
        Some(db_status) if db_status.reset_date == server_reset_date => {
            event!(Level::INFO, "schema matches reset {server_reset_date}");
            Ok(())
        }
        Some(db_status) => {
            let archive_name = connection_string.get_schema_name_for_reset_date(&db_status.reset_date);
            event!(
                Level::INFO,
                "schema is for reset '{}', server is on '{}' — archiving to {}",
                db_status.reset_date,
                server_reset_date,
                archive_name
            );
            rename_schema(pool, "public", &archive_name).await?;
            create_schema(pool, "public").await?;
            perform_migration(pool).await?;
            insert_status(pool, server_reset_date).await
        }
    }
}

async fn perform_migration(pool: &Pool<Postgres>) -> Result<()> {
    event!(Level::INFO, "migrating database if necessary");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

async fn rename_schema(pool: &Pool<Postgres>, from: &str, to: &str) -> Result<()> {
    sqlx::query(&format!("ALTER SCHEMA {from} RENAME TO {to}")).execute(pool).await?;
    Ok(())
}

async fn create_schema(pool: &Pool<Postgres>, name: &str) -> Result<()> {
    sqlx::query(&format!("CREATE SCHEMA {name}")).execute(pool).await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct DbStatus {
    reset_date: String,
}

async fn load_status(pool: &Pool<Postgres>) -> Result<Option<DbStatus>> {
    let row = sqlx::query_as!(
        DbStatus,
        r#"select reset_date from status limit 1"#
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn insert_status(pool: &Pool<Postgres>, reset_date: &str) -> Result<()> {
    sqlx::query!(
        r#"insert into status (reset_date) values ($1) on conflict (reset_date) do nothing"#,
        reset_date
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JsonRow<T>(pub Json<T>);
