//! Shared request/response types and per-key guards for broker operations.

// self
use crate::{
	_prelude::*,
	auth::{CredentialSecret, LeaseId, LeaseRecord, RoleName, TenantId, WorkloadIdentity},
	backend::DatabaseBackend,
	broker::{Broker, GuardMap},
};

// Idle guards are pruned once a map grows past this many entries.
const GUARD_PRUNE_THRESHOLD: usize = 1_024;

/// Parameters for [`Broker::issue`].
#[derive(Clone, Debug)]
pub struct IssueRequest {
	/// Tenant the credential is issued for.
	pub tenant: TenantId,
	/// Workload identity of the caller.
	pub identity: WorkloadIdentity,
	/// Role to create the credential from.
	pub role: RoleName,
	/// Requested lifetime; falls back to the role default.
	pub ttl: Option<Duration>,
}
impl IssueRequest {
	/// Creates a request that uses the role's default TTL.
	pub fn new(tenant: TenantId, identity: WorkloadIdentity, role: RoleName) -> Self {
		Self { tenant, identity, role, ttl: None }
	}

	/// Requests a specific lifetime (clamped to the role maximum).
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);

		self
	}
}

/// Credential handed back to the caller on issuance.
///
/// The password exists only here; the lease store never sees it.
#[derive(Clone)]
pub struct IssuedCredential {
	/// Lease tracking the credential.
	pub lease: LeaseRecord,
	/// Generated database password.
	pub password: CredentialSecret,
}
impl IssuedCredential {
	/// Database username.
	pub fn username(&self) -> &str {
		&self.lease.username
	}

	/// Lease identifier used for renewal and revocation.
	pub fn lease_id(&self) -> &LeaseId {
		&self.lease.id
	}

	/// Instant the credential stops being valid unless renewed.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.lease.expires_at
	}
}
impl Debug for IssuedCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedCredential")
			.field("lease", &self.lease)
			.field("password_fingerprint", &self.password.fingerprint())
			.finish()
	}
}

/// Parameters for [`Broker::renew`].
#[derive(Clone, Debug)]
pub struct RenewRequest {
	/// Lease to extend.
	pub lease_id: LeaseId,
	/// Requested extension measured from now; falls back to the role default TTL.
	pub increment: Option<Duration>,
}
impl RenewRequest {
	/// Creates a request that extends by the role's default TTL.
	pub fn new(lease_id: LeaseId) -> Self {
		Self { lease_id, increment: None }
	}

	/// Requests a specific extension.
	pub fn with_increment(mut self, increment: Duration) -> Self {
		self.increment = Some(increment);

		self
	}
}

/// Outcome of a bulk revocation.
#[derive(Debug, Default)]
pub struct RevocationReport {
	/// Leases revoked by this call.
	pub revoked: Vec<LeaseId>,
	/// Leases that could not be revoked, with the failure.
	pub failed: Vec<(LeaseId, Error)>,
}
impl RevocationReport {
	/// Returns `true` when every targeted lease was revoked.
	pub fn is_complete(&self) -> bool {
		self.failed.is_empty()
	}
}

pub(crate) fn lease_guard<B>(broker: &Broker<B>, id: &LeaseId) -> Arc<AsyncMutex<()>>
where
	B: ?Sized + DatabaseBackend,
{
	guard_for(&broker.lease_guards, id)
}

pub(crate) fn quota_guard<B>(
	broker: &Broker<B>,
	tenant: &TenantId,
	role: &RoleName,
) -> Arc<AsyncMutex<()>>
where
	B: ?Sized + DatabaseBackend,
{
	guard_for(&broker.quota_guards, &(tenant.clone(), role.clone()))
}

fn guard_for<K>(map: &GuardMap<K>, key: &K) -> Arc<AsyncMutex<()>>
where
	K: Clone + Eq + std::hash::Hash,
{
	let mut guards = map.lock();

	if guards.len() >= GUARD_PRUNE_THRESHOLD {
		guards.retain(|_, guard| Arc::strong_count(guard) > 1);
	}

	guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}
