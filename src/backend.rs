//! Database backends that execute rendered role statements.
//!
//! [`DatabaseBackend`] is the broker's only dependency on a database driver. Each call receives a
//! [`StatementBatch`] whose statements must be applied atomically: either every statement takes
//! effect or none do. Revocation batches are retried by the sweeper, so backends should treat
//! "role does not exist" the same as success (the default templates use `IF EXISTS`).

pub mod memory;
#[cfg(feature = "postgres")] pub mod postgres;

pub use memory::RecordingBackend;
#[cfg(feature = "postgres")] pub use postgres::PostgresBackend;

// self
use crate::{_prelude::*, auth::LeaseId};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`DatabaseBackend::execute`].
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BackendError>> + 'a + Send>>;

/// Executes statement batches against the target database.
pub trait DatabaseBackend
where
	Self: 'static + Send + Sync,
{
	/// Applies every statement in the batch atomically.
	fn execute<'a>(&'a self, batch: &'a StatementBatch) -> BackendFuture<'a>;
}

/// Why a batch is being executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementPurpose {
	/// Creates the credential.
	Creation,
	/// Extends the credential's validity.
	Renewal,
	/// Drops the credential.
	Revocation,
}
impl StatementPurpose {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			StatementPurpose::Creation => "creation",
			StatementPurpose::Renewal => "renewal",
			StatementPurpose::Revocation => "revocation",
		}
	}
}
impl Display for StatementPurpose {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Rendered statements for one lease operation.
#[derive(Clone)]
pub struct StatementBatch {
	/// Why the batch exists.
	pub purpose: StatementPurpose,
	/// Lease the batch belongs to.
	pub lease_id: LeaseId,
	/// Database username the statements act on.
	pub username: String,
	/// Rendered SQL, executed in order.
	pub statements: Vec<String>,
}
impl StatementBatch {
	/// Creates a batch.
	pub fn new(
		purpose: StatementPurpose,
		lease_id: LeaseId,
		username: impl Into<String>,
		statements: Vec<String>,
	) -> Self {
		Self { purpose, lease_id, username: username.into(), statements }
	}

	/// Iterator over the rendered statements.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.statements.iter().map(String::as_str)
	}
}
impl Debug for StatementBatch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut dbg = f.debug_struct("StatementBatch");

		dbg.field("purpose", &self.purpose)
			.field("lease_id", &self.lease_id)
			.field("username", &self.username);

		// Creation statements embed the password.
		if matches!(self.purpose, StatementPurpose::Creation) {
			dbg.field("statements", &format_args!("<{} redacted>", self.statements.len()));
		} else {
			dbg.field("statements", &self.statements);
		}

		dbg.finish()
	}
}

/// Failure reported by a [`DatabaseBackend`].
#[derive(Debug, ThisError)]
pub enum BackendError {
	/// The database refused a statement (permission, syntax, conflicting role).
	#[error("Database rejected the statement batch: {message}.")]
	Rejected {
		/// Database-supplied message.
		message: String,
	},
	/// The database could not be reached; safe to retry.
	#[error("Database is unavailable.")]
	Unavailable {
		/// Driver-specific failure.
		#[source]
		source: BoxError,
	},
}
impl BackendError {
	/// Wraps a driver connectivity failure.
	pub fn unavailable(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Unavailable { source: Box::new(src) }
	}

	/// Returns `true` when retrying the same batch may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Unavailable { .. })
	}
}
