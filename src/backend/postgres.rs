//! PostgreSQL [`DatabaseBackend`] built on a `sqlx` connection pool.

// crates.io
use sqlx::postgres::{PgPool, PgPoolOptions};
// self
use crate::{
	_prelude::*,
	backend::{BackendError, BackendFuture, DatabaseBackend, StatementBatch},
};

/// Runs each batch inside a single transaction on a pooled connection.
///
/// The pool's user needs `CREATEROLE` (and grant rights on whatever the role templates grant).
#[derive(Clone, Debug)]
pub struct PostgresBackend {
	pool: PgPool,
}
impl PostgresBackend {
	/// Connects a new pool to `url`.
	pub async fn connect(url: &str, max_connections: u32) -> Result<Self, BackendError> {
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.connect(url)
			.await
			.map_err(map_sqlx_error)?;

		Ok(Self { pool })
	}

	/// Wraps an existing pool.
	pub fn with_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Underlying pool.
	pub fn pool(&self) -> &PgPool {
		&self.pool
	}
}
impl DatabaseBackend for PostgresBackend {
	fn execute<'a>(&'a self, batch: &'a StatementBatch) -> BackendFuture<'a> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

			for statement in batch.iter() {
				sqlx::query(statement).execute(&mut *tx).await.map_err(map_sqlx_error)?;
			}

			tx.commit().await.map_err(map_sqlx_error)
		})
	}
}

fn map_sqlx_error(err: sqlx::Error) -> BackendError {
	match err {
		sqlx::Error::Database(db) => BackendError::Rejected { message: db.message().to_owned() },
		other => BackendError::unavailable(other),
	}
}
