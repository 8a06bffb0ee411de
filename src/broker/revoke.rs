//! Idempotent revocation shared by explicit callers and the sweeper.

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, LeaseRecord, RevocationFailure, TenantId},
	backend::{DatabaseBackend, StatementBatch, StatementPurpose},
	broker::{Broker, RevocationReport, common},
	obs::{self, LeaseEvent, LeaseOperation, LeaseOutcome, LeaseSpan},
	sweeper::SweeperConfig,
};

/// Who asked for a revocation; decides the retry schedule and the due check.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RevocationTrigger<'a> {
	/// A caller revoked the lease; a failure is retried on the next sweep.
	Explicit,
	/// The sweeper found the lease due; failures back off exponentially.
	Sweep(&'a SweeperConfig),
}

/// Result of one revocation attempt under the lease guard.
#[derive(Clone, Debug)]
pub(crate) enum RevocationAttempt {
	/// This attempt dropped the credential.
	Revoked(LeaseRecord),
	/// Another caller already revoked the lease.
	AlreadyRevoked(LeaseRecord),
	/// The lease was renewed or rescheduled since it was listed.
	NotDue(LeaseRecord),
}

impl<B> Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Revokes a lease at the current instant.
	pub async fn revoke(&self, id: &LeaseId) -> Result<LeaseRecord> {
		self.revoke_at(id, OffsetDateTime::now_utc()).await
	}

	/// Revokes a lease as if the current instant were `now`.
	///
	/// Revoking an already revoked lease returns it unchanged. When the database fails, the
	/// attempt is recorded on the lease (so the sweeper retries it) and the backend error is
	/// returned.
	pub async fn revoke_at(&self, id: &LeaseId, now: OffsetDateTime) -> Result<LeaseRecord> {
		const OPERATION: LeaseOperation = LeaseOperation::Revoke;

		let span = LeaseSpan::new(OPERATION, "revoke");

		obs::record_lease_outcome(OPERATION, LeaseOutcome::Attempt);

		let result = span
			.instrument(self.attempt_revocation(id, now, RevocationTrigger::Explicit))
			.await
			.map(|attempt| match attempt {
				// Explicit revocations skip the due check, so `NotDue` never occurs here.
				RevocationAttempt::Revoked(lease)
				| RevocationAttempt::AlreadyRevoked(lease)
				| RevocationAttempt::NotDue(lease) => lease,
			});

		match &result {
			Ok(_) => obs::record_lease_outcome(OPERATION, LeaseOutcome::Success),
			Err(_) => {
				self.metrics.record_failure();
				obs::record_lease_outcome(OPERATION, LeaseOutcome::Failure);
			},
		}

		result
	}

	/// Revokes every unrevoked lease held by a tenant at the current instant.
	pub async fn revoke_tenant(&self, tenant: &TenantId) -> Result<RevocationReport> {
		self.revoke_tenant_at(tenant, OffsetDateTime::now_utc()).await
	}

	/// Revokes every unrevoked lease held by a tenant as if the current instant were `now`.
	///
	/// Individual failures are collected in the report instead of aborting the batch.
	pub async fn revoke_tenant_at(
		&self,
		tenant: &TenantId,
		now: OffsetDateTime,
	) -> Result<RevocationReport> {
		let mut report = RevocationReport::default();
		let pending = self
			.store
			.list_tenant(tenant)
			.await?
			.into_iter()
			.filter(|lease| lease.id.belongs_to(tenant) && !lease.is_revoked());

		for lease in pending {
			match self.revoke_at(&lease.id, now).await {
				Ok(_) => report.revoked.push(lease.id),
				Err(err) => report.failed.push((lease.id, err)),
			}
		}

		Ok(report)
	}

	pub(crate) async fn attempt_revocation(
		&self,
		id: &LeaseId,
		now: OffsetDateTime,
		trigger: RevocationTrigger<'_>,
	) -> Result<RevocationAttempt> {
		let guard = common::lease_guard(self, id);
		let _singleflight = guard.lock().await;
		let current = self.lookup(id).await?;

		if current.is_revoked() {
			return Ok(RevocationAttempt::AlreadyRevoked(current));
		}
		if matches!(trigger, RevocationTrigger::Sweep(_)) && !current.is_due_at(now) {
			return Ok(RevocationAttempt::NotDue(current));
		}

		if !current.revocation_statements.is_empty() {
			let batch = StatementBatch::new(
				StatementPurpose::Revocation,
				id.clone(),
				current.username.as_str(),
				current.revocation_statements.clone(),
			);

			if let Err(err) = self.backend.execute(&batch).await {
				let attempts = current.revocation_attempts.saturating_add(1);
				let retry_at = match trigger {
					RevocationTrigger::Explicit => now,
					RevocationTrigger::Sweep(config) =>
						now.saturating_add(config.backoff_for(attempts)),
				};
				let failure =
					RevocationFailure { message: err.to_string(), attempted_at: now, retry_at };
				let updated = self.store.record_revocation_failure(id, failure).await?;

				obs::emit_revocation_failure(updated.as_ref().unwrap_or(&current), &err);

				return Err(err.into());
			}
		}

		let revoked =
			self.store.mark_revoked(id, now).await?.ok_or_else(|| Error::LeaseNotFound(id.clone()))?;

		self.metrics.record_revoked();
		obs::emit_lease_event(LeaseEvent::Revoked, &revoked);

		Ok(RevocationAttempt::Revoked(revoked))
	}
}
