//! Credential broker facade: issuance, renewal, and revocation of database leases.
//!
//! [`Broker`] owns the database backend, the lease store, the role catalog, and the credential
//! generator so each operation module can focus on its own lifecycle step. Every operation on a
//! single lease runs under a per-lease async guard, so manual revocation and the sweeper never
//! execute the same statements concurrently.

pub mod common;

mod issue;
mod metrics;
mod renew;
mod revoke;

pub use common::*;
pub use metrics::BrokerMetrics;

pub(crate) use revoke::{RevocationAttempt, RevocationTrigger};

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, LeaseRecord, RoleName, TenantId},
	backend::DatabaseBackend,
	role::{CredentialGenerator, DefaultCredentialGenerator, RoleCatalog},
	store::LeaseStore,
};

type GuardMap<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Issues and tracks short-lived database credentials for tenant workloads.
pub struct Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Backend that executes rendered statements.
	pub backend: Arc<B>,
	/// Durable lease record.
	pub store: Arc<dyn LeaseStore>,
	/// Roles the broker can issue.
	pub roles: Arc<RoleCatalog>,
	/// Username and password minting strategy.
	pub generator: Arc<dyn CredentialGenerator>,
	/// Shared counters for broker operations.
	pub metrics: Arc<BrokerMetrics>,
	lease_guards: GuardMap<LeaseId>,
	quota_guards: GuardMap<(TenantId, RoleName)>,
}
impl<B> Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Creates a broker using the [`DefaultCredentialGenerator`].
	pub fn new(
		backend: impl Into<Arc<B>>,
		store: Arc<dyn LeaseStore>,
		roles: RoleCatalog,
	) -> Self {
		Self {
			backend: backend.into(),
			store,
			roles: Arc::new(roles),
			generator: Arc::new(DefaultCredentialGenerator::default()),
			metrics: Default::default(),
			lease_guards: Default::default(),
			quota_guards: Default::default(),
		}
	}

	/// Replaces the credential generator.
	pub fn with_generator(mut self, generator: Arc<dyn CredentialGenerator>) -> Self {
		self.generator = generator;

		self
	}

	/// Fetches a lease by identifier.
	pub async fn lookup(&self, id: &LeaseId) -> Result<LeaseRecord> {
		self.store.fetch(id).await?.ok_or_else(|| Error::LeaseNotFound(id.clone()))
	}

	/// Lists every lease (revoked included) held by a tenant, ordered by issue time.
	pub async fn list_tenant(&self, tenant: &TenantId) -> Result<Vec<LeaseRecord>> {
		Ok(self.store.list_tenant(tenant).await?)
	}
}
impl<B> Clone for Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	fn clone(&self) -> Self {
		Self {
			backend: self.backend.clone(),
			store: self.store.clone(),
			roles: self.roles.clone(),
			generator: self.generator.clone(),
			metrics: self.metrics.clone(),
			lease_guards: self.lease_guards.clone(),
			quota_guards: self.quota_guards.clone(),
		}
	}
}
impl<B> Debug for Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("roles", &self.roles.len())
			.field("metrics", &self.metrics)
			.finish()
	}
}
