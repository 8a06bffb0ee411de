//! Storage contracts and built-in lease store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, LeaseRecord, RevocationFailure, TenantId},
};

/// Boxed future returned by [`LeaseStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable record of issued leases.
pub trait LeaseStore
where
	Self: Send + Sync,
{
	/// Persists or replaces a lease record.
	fn save(&self, record: LeaseRecord) -> StoreFuture<'_, ()>;

	/// Fetches a lease by identifier, if present.
	fn fetch<'a>(&'a self, id: &'a LeaseId) -> StoreFuture<'a, Option<LeaseRecord>>;

	/// Lists every lease (revoked included) for a tenant, ordered by issue time.
	fn list_tenant<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<LeaseRecord>>;

	/// Lists up to `limit` unrevoked leases due for revocation at `now`, earliest expiry first.
	fn list_due(&self, now: OffsetDateTime, limit: usize) -> StoreFuture<'_, Vec<LeaseRecord>>;

	/// Replaces a lease only if its stored expiry still equals `expected_expires_at`.
	fn compare_and_swap_expiry<'a>(
		&'a self,
		id: &'a LeaseId,
		expected_expires_at: OffsetDateTime,
		replacement: LeaseRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Marks a lease as revoked at the provided instant.
	fn mark_revoked<'a>(
		&'a self,
		id: &'a LeaseId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<LeaseRecord>>;

	/// Records a failed revocation attempt.
	fn record_revocation_failure<'a>(
		&'a self,
		id: &'a LeaseId,
		failure: RevocationFailure,
	) -> StoreFuture<'a, Option<LeaseRecord>>;

	/// Deletes leases revoked strictly before `before`, returning how many were removed.
	fn purge_revoked(&self, before: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Result of an expiry compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored expiry matched and the record was replaced.
	Updated,
	/// The record exists but its expiry changed concurrently.
	ExpiryMismatch,
	/// No record matched the identifier.
	Missing,
}

/// Error type produced by [`LeaseStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Shared query semantics so every backend orders and filters identically.
pub(crate) mod query {
	// self
	use super::*;

	pub(crate) fn tenant<'a, I>(records: I, tenant: &TenantId) -> Vec<LeaseRecord>
	where
		I: Iterator<Item = &'a LeaseRecord>,
	{
		let mut matches =
			records.filter(|record| record.tenant == *tenant).cloned().collect::<Vec<_>>();

		matches.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then_with(|| a.id.cmp(&b.id)));

		matches
	}

	pub(crate) fn due<'a, I>(records: I, now: OffsetDateTime, limit: usize) -> Vec<LeaseRecord>
	where
		I: Iterator<Item = &'a LeaseRecord>,
	{
		let mut due = records.filter(|record| record.is_due_at(now)).cloned().collect::<Vec<_>>();

		due.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));
		due.truncate(limit);

		due
	}

	pub(crate) fn is_purgeable(record: &LeaseRecord, before: OffsetDateTime) -> bool {
		record.revoked_at.is_some_and(|revoked_at| revoked_at < before)
	}
}
