//! `PostgreSQL` adapters for catalog, credential, and outbox persistence.
//!
//! Every operation runs on the blocking thread pool with a pooled
//! connection, and every multi-statement write runs in one transaction.

mod conversions;
mod models;
mod outbox;
mod repository;
mod schema;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};

pub use outbox::PostgresNotificationOutbox;
pub use repository::PostgresCatalogStore;

/// `PostgreSQL` connection pool type for catalog adapters.
pub type CatalogPgPool = Pool<ConnectionManager<PgConnection>>;

/// Port error types that can wrap a persistence failure.
trait PersistenceFailure: Send + 'static {
    fn from_failure(err: impl std::error::Error + Send + Sync + 'static) -> Self;
}

impl PersistenceFailure for crate::catalog::ports::CatalogStoreError {
    fn from_failure(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }
}

impl PersistenceFailure for crate::catalog::ports::CredentialStoreError {
    fn from_failure(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }
}

impl PersistenceFailure for crate::catalog::ports::NotificationOutboxError {
    fn from_failure(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }
}

async fn run_blocking<F, T, E>(pool: &CatalogPgPool, operation: F) -> Result<T, E>
where
    F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: PersistenceFailure,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut connection = pool.get().map_err(E::from_failure)?;
        operation(&mut connection)
    })
    .await
    .map_err(E::from_failure)?
}
