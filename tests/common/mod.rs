//! Shared fixtures for integration tests.

#![allow(dead_code)]

// std
use std::sync::{
	Arc, Mutex,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use credential_broker::{
	auth::{LeaseId, LeaseRecord, RevocationFailure, RoleName, TenantId, WorkloadIdentity},
	backend::RecordingBackend,
	broker::{Broker, IssueRequest, IssuedCredential},
	role::{RoleCatalog, RoleDescriptor, RoleDescriptorBuilder},
	store::{CompareAndSwapOutcome, LeaseStore, MemoryStore, StoreError, StoreFuture},
};

/// Fixed instant most tests issue at.
pub const T0: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

pub const CREATE_STATEMENT: &str = "CREATE ROLE \"{{name}}\" WITH LOGIN PASSWORD '{{password}}' \
	VALID UNTIL '{{expiration}}';";
pub const GRANT_STATEMENT: &str = "GRANT SELECT ON ALL TABLES IN SCHEMA public TO \"{{name}}\";";

pub fn tenant(value: &str) -> TenantId {
	TenantId::new(value).expect("Tenant fixture should be valid.")
}

pub fn role_name(value: &str) -> RoleName {
	RoleName::new(value).expect("Role fixture should be valid.")
}

pub fn identity(namespace: &str, service_account: &str) -> WorkloadIdentity {
	WorkloadIdentity::new(namespace, service_account).expect("Identity fixture should be valid.")
}

/// `readonly` role on `orders`: 1h default TTL, 4h ceiling, any `acme` workload for tenant
/// `acme`, and `globex/reporting` for tenant `globex`.
pub fn readonly_builder() -> RoleDescriptorBuilder {
	RoleDescriptor::builder(role_name("readonly"))
		.database("orders")
		.creation_statements([CREATE_STATEMENT, GRANT_STATEMENT])
		.default_ttl(Duration::hours(1))
		.max_ttl(Duration::hours(4))
		.bind(tenant("acme"), "acme", "*")
		.bind(tenant("globex"), "globex", "reporting")
}

pub fn readonly_role() -> RoleDescriptor {
	readonly_builder().build().expect("Readonly role fixture should build.")
}

pub struct Harness {
	pub broker: Broker<RecordingBackend>,
	pub backend: RecordingBackend,
	pub store: Arc<MemoryStore>,
}
impl Harness {
	pub fn new(roles: impl IntoIterator<Item = RoleDescriptor>) -> Self {
		let store = Arc::new(MemoryStore::default());

		Self::with_store(roles, store.clone(), store)
	}

	/// Broker backed by a [`ScriptedStore`]; `store` still exposes the underlying leases.
	pub fn scripted(roles: impl IntoIterator<Item = RoleDescriptor>) -> (Self, Arc<ScriptedStore>) {
		let scripted = Arc::new(ScriptedStore::default());
		let harness = Self::with_store(roles, scripted.clone(), scripted.inner.clone());

		(harness, scripted)
	}

	fn with_store(
		roles: impl IntoIterator<Item = RoleDescriptor>,
		broker_store: Arc<dyn LeaseStore>,
		store: Arc<MemoryStore>,
	) -> Self {
		let backend = RecordingBackend::default();
		let catalog = RoleCatalog::new(roles).expect("Role catalog fixture should build.");
		let broker: Broker<RecordingBackend> = Broker::new(backend.clone(), broker_store, catalog);

		Self { broker, backend, store }
	}

	pub fn readonly() -> Self {
		Self::new([readonly_role()])
	}

	/// Issues a `readonly` credential for `acme/api` at `at`.
	pub async fn issue_acme(&self, at: OffsetDateTime) -> IssuedCredential {
		let request =
			IssueRequest::new(tenant("acme"), identity("acme", "api"), role_name("readonly"));

		self.broker
			.issue_at(request, at)
			.await
			.expect("Issuing the acme fixture credential should succeed.")
	}
}

/// Change applied by another writer right before the next expiry compare-and-swap.
pub enum Interference {
	/// Moves the stored expiry to the given instant.
	MoveExpiry(OffsetDateTime),
	/// Revokes and purges the lease.
	Remove,
}

/// [`MemoryStore`] wrapper that can interleave writes and fail revocation bookkeeping.
#[derive(Default)]
pub struct ScriptedStore {
	pub inner: Arc<MemoryStore>,
	interference: Mutex<Option<Interference>>,
	fail_mark_revoked: AtomicBool,
	mark_revoked_calls: AtomicUsize,
}
impl ScriptedStore {
	pub fn interfere_before_next_cas(&self, interference: Interference) {
		*self.interference.lock().expect("Interference slot should not be poisoned.") =
			Some(interference);
	}

	pub fn fail_mark_revoked(&self) {
		self.fail_mark_revoked.store(true, Ordering::SeqCst);
	}

	pub fn mark_revoked_calls(&self) -> usize {
		self.mark_revoked_calls.load(Ordering::SeqCst)
	}
}
impl LeaseStore for ScriptedStore {
	fn save(&self, record: LeaseRecord) -> StoreFuture<'_, ()> {
		self.inner.save(record)
	}

	fn fetch<'a>(&'a self, id: &'a LeaseId) -> StoreFuture<'a, Option<LeaseRecord>> {
		self.inner.fetch(id)
	}

	fn list_tenant<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<LeaseRecord>> {
		self.inner.list_tenant(tenant)
	}

	fn list_due(&self, now: OffsetDateTime, limit: usize) -> StoreFuture<'_, Vec<LeaseRecord>> {
		self.inner.list_due(now, limit)
	}

	fn compare_and_swap_expiry<'a>(
		&'a self,
		id: &'a LeaseId,
		expected_expires_at: OffsetDateTime,
		replacement: LeaseRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let interference =
				self.interference.lock().expect("Interference slot should not be poisoned.").take();

			match interference {
				Some(Interference::MoveExpiry(instant)) => {
					if let Some(mut record) = self.inner.fetch(id).await? {
						record.expires_at = instant;
						self.inner.save(record).await?;
					}
				},
				Some(Interference::Remove) => {
					self.inner.mark_revoked(id, T0).await?;
					self.inner.purge_revoked(T0 + Duration::SECOND).await?;
				},
				None => {},
			}

			self.inner.compare_and_swap_expiry(id, expected_expires_at, replacement).await
		})
	}

	fn mark_revoked<'a>(
		&'a self,
		id: &'a LeaseId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<LeaseRecord>> {
		self.mark_revoked_calls.fetch_add(1, Ordering::SeqCst);

		if self.fail_mark_revoked.load(Ordering::SeqCst) {
			return Box::pin(async {
				Err::<Option<LeaseRecord>, _>(StoreError::Backend {
					message: "lease table is read-only".into(),
				})
			});
		}

		self.inner.mark_revoked(id, instant)
	}

	fn record_revocation_failure<'a>(
		&'a self,
		id: &'a LeaseId,
		failure: RevocationFailure,
	) -> StoreFuture<'a, Option<LeaseRecord>> {
		self.inner.record_revocation_failure(id, failure)
	}

	fn purge_revoked(&self, before: OffsetDateTime) -> StoreFuture<'_, usize> {
		self.inner.purge_revoked(before)
	}
}
