//! Per-request database access.
//!
//! Handlers never share a connection. Each call opens a fresh
//! [`Database`] on the blocking pool, runs the closure and drops the
//! connection; SQLite's own locking coordinates concurrent requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use carebook_store::{Database, StoreError};

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct DbHandle {
    path: Arc<PathBuf>,
    busy_timeout: Duration,
}

impl DbHandle {
    pub fn new(path: PathBuf, busy_timeout: Duration) -> Self {
        Self {
            path: Arc::new(path),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a connection of its own on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.path);
        let busy_timeout = self.busy_timeout;

        let result = tokio::task::spawn_blocking(move || {
            let mut db = Database::open_with_timeout(&path, busy_timeout)?;
            f(&mut db)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?;

        Ok(result?)
    }

    /// Open once so pending migrations run before the server accepts
    /// requests.
    pub async fn migrate(&self) -> Result<(), ServerError> {
        self.run(|_| Ok(())).await
    }
}
