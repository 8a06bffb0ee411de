//! Lease renewal with a hard lifetime ceiling and compare-and-swap persistence.

// self
use crate::{
	_prelude::*,
	auth::LeaseRecord,
	backend::{DatabaseBackend, StatementBatch, StatementPurpose},
	broker::{Broker, RenewRequest, common},
	error::ConfigError,
	obs::{self, LeaseEvent, LeaseOperation, LeaseOutcome, LeaseSpan},
	role::StatementContext,
	store::CompareAndSwapOutcome,
};

impl<B> Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Extends a lease at the current instant.
	pub async fn renew(&self, request: RenewRequest) -> Result<LeaseRecord> {
		self.renew_at(request, OffsetDateTime::now_utc()).await
	}

	/// Extends a lease as if the current instant were `now`.
	///
	/// The new expiry is `now + increment`, capped at the lease's `max_expires_at`. A renewal that
	/// would not move the expiry forward returns the stored lease untouched.
	pub async fn renew_at(&self, request: RenewRequest, now: OffsetDateTime) -> Result<LeaseRecord> {
		const OPERATION: LeaseOperation = LeaseOperation::Renew;

		let span = LeaseSpan::new(OPERATION, "renew");

		obs::record_lease_outcome(OPERATION, LeaseOutcome::Attempt);

		let result = span.instrument(self.renew_inner(request, now)).await;

		match &result {
			Ok(_) => obs::record_lease_outcome(OPERATION, LeaseOutcome::Success),
			Err(_) => {
				self.metrics.record_failure();
				obs::record_lease_outcome(OPERATION, LeaseOutcome::Failure);
			},
		}

		result
	}

	async fn renew_inner(&self, request: RenewRequest, now: OffsetDateTime) -> Result<LeaseRecord> {
		let RenewRequest { lease_id, increment } = request;
		let guard = common::lease_guard(self, &lease_id);
		let _singleflight = guard.lock().await;
		let current = self.lookup(&lease_id).await?;

		// A failed revocation is still owed; the sweeper will drop the role regardless.
		if current.is_revoked() || current.revocation_attempts > 0 {
			return Err(Error::Revoked(lease_id));
		}
		if current.is_expired_at(now) {
			return Err(Error::LeaseExpired(lease_id));
		}

		let descriptor = self
			.roles
			.get(&current.role)
			.ok_or_else(|| Error::UnknownRole { role: current.role.clone() })?;
		let increment = increment.unwrap_or(descriptor.default_ttl);

		if !increment.is_positive() {
			return Err(ConfigError::NonPositiveTtl.into());
		}

		let target = now.saturating_add(increment).min(current.max_expires_at);

		if target <= current.expires_at {
			return Ok(current);
		}

		let renewed = current.renewed_until(target);
		let statements = descriptor
			.render_renewal(&StatementContext {
				name: &renewed.username,
				password: None,
				expiration: renewed.expires_at,
				tenant: &renewed.tenant,
				role: &renewed.role,
				database: &descriptor.database,
			})
			.map_err(ConfigError::from)?;
		let batch = StatementBatch::new(
			StatementPurpose::Renewal,
			lease_id.clone(),
			renewed.username.as_str(),
			statements,
		);

		self.backend.execute(&batch).await?;

		match self.store.compare_and_swap_expiry(&lease_id, current.expires_at, renewed.clone()).await?
		{
			CompareAndSwapOutcome::Updated => {
				self.metrics.record_renewed();
				obs::emit_lease_event(LeaseEvent::Renewed, &renewed);

				Ok(renewed)
			},
			CompareAndSwapOutcome::ExpiryMismatch => self.lookup(&lease_id).await,
			CompareAndSwapOutcome::Missing => Err(Error::LeaseNotFound(lease_id)),
		}
	}
}
