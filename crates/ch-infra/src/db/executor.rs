use std::sync::Arc;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;

/// Runs a closure against a pooled connection.
///
/// Keeps the repository free of pool plumbing and easy to point at an
/// in-memory database in tests.
pub trait DbExecutor: Send + Sync {
    fn run<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T>;
}

pub struct DieselSqliteExecutor {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl DieselSqliteExecutor {
    pub fn new(pool: Pool<ConnectionManager<SqliteConnection>>) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

impl DbExecutor for DieselSqliteExecutor {
    fn run<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }
}
