//! Test utilities for database operations.
//!
//! Tests run against an in-memory `SQLite` database migrated with the
//! production migrator. Enable the `sqlx-sqlite` feature of `sea-orm` in
//! the consuming crate's dev-dependencies.

use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// In-memory database URL.
pub const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

/// A migrated, throwaway database.
///
/// The pool holds exactly one connection: every in-memory `SQLite`
/// connection is its own database, so a second one would see no tables.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create a fresh database and run all migrations.
    pub async fn new() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new(SQLITE_MEMORY_URL);
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        info!("Created in-memory test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Get a shared handle for repositories and services.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }
}
