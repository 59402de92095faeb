//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod members;
pub mod memory;
pub mod users;

use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    config::{DatabaseBackend, DatabaseConfig},
    error::{AppError, AppResult},
};

use self::{
    books::{BooksRepository, PgBooksRepository},
    loans::{LoansRepository, PgLoansRepository},
    members::{MembersRepository, PgMembersRepository},
    memory::MemoryStore,
    users::{PgUsersRepository, UsersRepository},
};

/// Main repository struct holding the stores and, for Postgres, the owned pool
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn BooksRepository>,
    pub members: Arc<dyn MembersRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub loans: Arc<dyn LoansRepository>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(PgBooksRepository::new(pool.clone())),
            members: Arc::new(PgMembersRepository::new(pool.clone())),
            users: Arc::new(PgUsersRepository::new(pool.clone())),
            loans: Arc::new(PgLoansRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Volatile stores sharing one lock
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self::from_stores(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        )
    }

    /// Assemble a repository from arbitrary store implementations
    pub fn from_stores(
        books: Arc<dyn BooksRepository>,
        members: Arc<dyn MembersRepository>,
        users: Arc<dyn UsersRepository>,
        loans: Arc<dyn LoansRepository>,
    ) -> Self {
        Self {
            pool: None,
            books,
            members,
            users,
            loans,
        }
    }

    /// Connect to the configured backend, failing fast if it is unreachable.
    /// For Postgres, pending migrations are applied before returning.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend {
            DatabaseBackend::Memory => {
                tracing::warn!("Using in-memory storage; data will not survive a restart");
                Ok(Self::in_memory())
            }
            DatabaseBackend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .connect(&config.url)
                    .await?;

                tracing::info!("Connected to database");

                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| AppError::Database(sqlx::Error::Migrate(Box::new(e))))?;

                tracing::info!("Database migrations completed");

                Ok(Self::new(pool))
            }
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }

    /// Drain and close the pool
    pub async fn close(&self) {
        if let Some(ref pool) = self.pool {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    let unique = err
        .as_database_error()
        .map_or(false, |db| db.is_unique_violation());
    if unique {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(err)
    }
}
