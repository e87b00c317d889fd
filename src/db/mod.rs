mod models;
pub mod queries;
mod store;

pub use models::*;
pub use store::{NewRevision, RevisionStore};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::directory::Capability;

pub type DbPool = Arc<SqlitePool>;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// Catalog rows are owned by the institution directory; these helpers exist so
// fixtures and local setups can populate it.

pub async fn insert_sede(pool: &SqlitePool, id: i64, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO sedes (id, name) VALUES (?1, ?2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_principal(
    pool: &SqlitePool,
    principal: &Principal,
    capabilities: &[Capability],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO principals (id, carnet, full_name, email) VALUES (?1, ?2, ?3, ?4)")
        .bind(principal.id)
        .bind(&principal.carnet)
        .bind(&principal.full_name)
        .bind(&principal.email)
        .execute(&mut *tx)
        .await?;

    for capability in capabilities {
        sqlx::query(
            "INSERT INTO principal_capabilities (principal_id, capability) VALUES (?1, ?2)",
        )
        .bind(principal.id)
        .bind(capability.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
