// SQLite persistence for import batches

pub mod import_batches;
pub mod migrations;

use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::{DbPool, Error};

/// Brings the schema up to the latest migration.
pub fn migrate_db(conn: &mut Connection) -> Result<(), Error> {
    migrations::runner().to_latest(conn)?;
    Ok(())
}

/// Schema version recorded in `user_version`.
pub fn schema_version(conn: &Connection) -> Result<i64, Error> {
    let version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Opens (creating if needed) the database file and migrates it.
pub fn open_pool(path: &Path) -> Result<DbPool, Error> {
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
    let pool = r2d2::Pool::builder().build(manager)?;
    {
        let mut conn = pool.get()?;
        migrate_db(&mut conn)?;
    }
    info!(path = %path.display(), "import store ready");
    Ok(pool)
}

/// In-memory store on a single connection, so every checkout sees the same database.
pub fn open_in_memory() -> Result<DbPool, Error> {
    let manager = SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    {
        let mut conn = pool.get()?;
        migrate_db(&mut conn)?;
    }
    Ok(pool)
}
