//! Thread-safe in-memory [`LeaseStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, LeaseRecord, RevocationFailure, TenantId},
	store::{CompareAndSwapOutcome, LeaseStore, StoreError, StoreFuture, query},
};

type StoreMap = Arc<RwLock<HashMap<LeaseId, LeaseRecord>>>;

/// Thread-safe storage backend that keeps leases in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored leases, revoked included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when the store holds no leases.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, record: LeaseRecord) -> Result<(), StoreError> {
		map.write().insert(record.id.clone(), record);

		Ok(())
	}

	fn cas_now(
		map: StoreMap,
		id: &LeaseId,
		expected_expires_at: OffsetDateTime,
		replacement: LeaseRecord,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = match guard.get(id) {
			Some(existing)
				if existing.expires_at == expected_expires_at && !existing.is_revoked() =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::ExpiryMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(id.clone(), replacement);
		}

		outcome
	}

	fn update_now(
		map: StoreMap,
		id: &LeaseId,
		apply: impl FnOnce(&mut LeaseRecord),
	) -> Option<LeaseRecord> {
		let mut guard = map.write();

		guard.get_mut(id).map(|record| {
			apply(record);

			record.clone()
		})
	}
}
impl LeaseStore for MemoryStore {
	fn save(&self, record: LeaseRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch<'a>(&'a self, id: &'a LeaseId) -> StoreFuture<'a, Option<LeaseRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(id).cloned()) })
	}

	fn list_tenant<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<LeaseRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(query::tenant(map.read().values(), tenant)) })
	}

	fn list_due(&self, now: OffsetDateTime, limit: usize) -> StoreFuture<'_, Vec<LeaseRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(query::due(map.read().values(), now, limit)) })
	}

	fn compare_and_swap_expiry<'a>(
		&'a self,
		id: &'a LeaseId,
		expected_expires_at: OffsetDateTime,
		replacement: LeaseRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, id, expected_expires_at, replacement)) })
	}

	fn mark_revoked<'a>(
		&'a self,
		id: &'a LeaseId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<LeaseRecord>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(Self::update_now(map, id, |record| {
				if !record.is_revoked() {
					record.revoke(instant);
				}
			}))
		})
	}

	fn record_revocation_failure<'a>(
		&'a self,
		id: &'a LeaseId,
		failure: RevocationFailure,
	) -> StoreFuture<'a, Option<LeaseRecord>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(Self::update_now(map, id, |record| record.record_revocation_failure(failure)))
		})
	}

	fn purge_revoked(&self, before: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();
			let initial = guard.len();

			guard.retain(|_, record| !query::is_purgeable(record, before));

			Ok(initial - guard.len())
		})
	}
}
