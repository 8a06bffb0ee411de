//! Lease records describing issued credentials, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, RoleName, TenantId, WorkloadIdentity},
};

/// Current lifecycle status for a lease.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
	/// Credential is currently valid.
	Active,
	/// Credential exceeded its expiry instant and awaits revocation.
	Expired,
	/// Credential has been dropped from the database.
	Revoked,
}

/// Errors produced by [`LeaseRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum LeaseRecordBuilderError {
	/// Issued when no database username was provided.
	#[error("Database username is required.")]
	MissingUsername,
	/// Issued when no workload identity was provided.
	#[error("Workload identity is required.")]
	MissingIdentity,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// The computed expiry does not fall after the issued-at instant.
	#[error("Lease lifetime must be positive.")]
	NonPositiveLifetime,
	/// The computed expiry exceeds the hard ceiling.
	#[error("Lease expiry exceeds the maximum lifetime.")]
	ExpiryBeyondMaximum,
	/// A lifetime added to the issued-at instant leaves the representable range.
	#[error("Lease lifetime does not fit in the supported time range.")]
	OutOfRange,
}

/// Failure bookkeeping applied when a revocation attempt does not succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevocationFailure {
	/// Rendered backend error message.
	pub message: String,
	/// Instant of the failed attempt.
	pub attempted_at: OffsetDateTime,
	/// Earliest instant the sweeper may retry.
	pub retry_at: OffsetDateTime,
}

/// Record describing one issued credential and its lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
	/// Lease identifier returned to the caller.
	pub id: LeaseId,
	/// Tenant the credential was issued for.
	pub tenant: TenantId,
	/// Role template the credential was created from.
	pub role: RoleName,
	/// Workload identity that requested the credential.
	pub identity: WorkloadIdentity,
	/// Generated database username.
	pub username: String,
	/// Issued-at instant.
	pub issued_at: OffsetDateTime,
	/// Current expiry instant; renewals move it forward.
	pub expires_at: OffsetDateTime,
	/// Hard ceiling renewals can never cross.
	pub max_expires_at: OffsetDateTime,
	/// Number of successful renewals.
	pub renewals: u32,
	/// Rendered statements that drop the credential from the database.
	pub revocation_statements: Vec<String>,
	/// Revocation instant if the lease has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
	/// Number of failed revocation attempts.
	pub revocation_attempts: u32,
	/// Most recent revocation failure message.
	pub last_revocation_error: Option<String>,
	/// Earliest instant the sweeper may retry a failed revocation.
	pub next_revocation_at: Option<OffsetDateTime>,
}
impl LeaseRecord {
	/// Returns a builder for constructing lease records.
	pub fn builder(id: LeaseId, tenant: TenantId, role: RoleName) -> LeaseRecordBuilder {
		LeaseRecordBuilder::new(id, tenant, role)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> LeaseStatus {
		if self.revoked_at.is_some() {
			return LeaseStatus::Revoked;
		}
		if instant >= self.expires_at {
			return LeaseStatus::Expired;
		}

		LeaseStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> LeaseStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the lease is active at the provided instant.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), LeaseStatus::Active)
	}

	/// Returns `true` if the lease has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), LeaseStatus::Expired)
	}

	/// Returns `true` if the lease has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Remaining lifetime at the provided instant, floored at zero.
	pub fn ttl_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Returns `true` when the sweeper should attempt revocation at `instant`.
	///
	/// Expired leases are due, and so are unexpired leases whose explicit revocation failed.
	pub fn is_due_at(&self, instant: OffsetDateTime) -> bool {
		if self.is_revoked() {
			return false;
		}

		let pending = instant >= self.expires_at || self.revocation_attempts > 0;

		pending && self.next_revocation_at.is_none_or(|retry| retry <= instant)
	}

	/// Marks the lease as revoked and clears retry bookkeeping.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
		self.next_revocation_at = None;
	}

	/// Records a failed revocation attempt.
	pub fn record_revocation_failure(&mut self, failure: RevocationFailure) {
		self.revocation_attempts = self.revocation_attempts.saturating_add(1);
		self.last_revocation_error = Some(failure.message);
		self.next_revocation_at = Some(failure.retry_at.max(failure.attempted_at));
	}

	/// Returns a copy extended to `expires_at` (clamped to the ceiling) with the renewal counted.
	pub fn renewed_until(&self, expires_at: OffsetDateTime) -> Self {
		let mut renewed = self.clone();

		renewed.expires_at = expires_at.min(self.max_expires_at);
		renewed.renewals = renewed.renewals.saturating_add(1);

		renewed
	}
}

/// Builder for [`LeaseRecord`].
#[derive(Clone, Debug)]
pub struct LeaseRecordBuilder {
	id: LeaseId,
	tenant: TenantId,
	role: RoleName,
	identity: Option<WorkloadIdentity>,
	username: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	max_ttl: Option<Duration>,
	revocation_statements: Vec<String>,
}
impl LeaseRecordBuilder {
	fn new(id: LeaseId, tenant: TenantId, role: RoleName) -> Self {
		Self {
			id,
			tenant,
			role,
			identity: None,
			username: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			max_ttl: None,
			revocation_statements: Vec::new(),
		}
	}

	/// Sets the requesting workload identity.
	pub fn identity(mut self, identity: WorkloadIdentity) -> Self {
		self.identity = Some(identity);

		self
	}

	/// Sets the generated database username.
	pub fn username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the hard lifetime ceiling; defaults to the initial expiry.
	pub fn max_ttl(mut self, duration: Duration) -> Self {
		self.max_ttl = Some(duration);

		self
	}

	/// Provides the rendered revocation statements.
	pub fn revocation_statements<I, S>(mut self, statements: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.revocation_statements = statements.into_iter().map(Into::into).collect();

		self
	}

	/// Consumes the builder and produces a [`LeaseRecord`].
	pub fn build(self) -> Result<LeaseRecord, LeaseRecordBuilderError> {
		let identity = self.identity.ok_or(LeaseRecordBuilderError::MissingIdentity)?;
		let username = self
			.username
			.filter(|name| !name.is_empty())
			.ok_or(LeaseRecordBuilderError::MissingUsername)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(LeaseRecordBuilderError::OutOfRange)?,
			(None, None) => return Err(LeaseRecordBuilderError::MissingExpiry),
		};

		if expires_at <= issued_at {
			return Err(LeaseRecordBuilderError::NonPositiveLifetime);
		}

		let max_expires_at = match self.max_ttl {
			Some(ttl) => issued_at.checked_add(ttl).ok_or(LeaseRecordBuilderError::OutOfRange)?,
			None => expires_at,
		};

		if expires_at > max_expires_at {
			return Err(LeaseRecordBuilderError::ExpiryBeyondMaximum);
		}

		Ok(LeaseRecord {
			id: self.id,
			tenant: self.tenant,
			role: self.role,
			identity,
			username,
			issued_at,
			expires_at,
			max_expires_at,
			renewals: 0,
			revocation_statements: self.revocation_statements,
			revoked_at: None,
			revocation_attempts: 0,
			last_revocation_error: None,
			next_revocation_at: None,
		})
	}
}
