//! Credential issuance with write-ahead lease persistence.
//!
//! The lease is saved before the creation statements run, so a crash between the two leaves a
//! record the sweeper can clean up instead of an orphaned database role.

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, LeaseRecord, LeaseRecordBuilderError},
	backend::{BackendError, DatabaseBackend, StatementBatch, StatementPurpose},
	broker::{Broker, IssueRequest, IssuedCredential, common},
	error::ConfigError,
	obs::{self, LeaseEvent, LeaseOperation, LeaseOutcome, LeaseSpan},
	role::{StatementContext, UsernameContext},
};

impl<B> Broker<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Issues a credential for the request at the current instant.
	pub async fn issue(&self, request: IssueRequest) -> Result<IssuedCredential> {
		self.issue_at(request, OffsetDateTime::now_utc()).await
	}

	/// Issues a credential as if the current instant were `now`.
	pub async fn issue_at(
		&self,
		request: IssueRequest,
		now: OffsetDateTime,
	) -> Result<IssuedCredential> {
		const OPERATION: LeaseOperation = LeaseOperation::Issue;

		let span = LeaseSpan::new(OPERATION, "issue");

		obs::record_lease_outcome(OPERATION, LeaseOutcome::Attempt);

		let result = span.instrument(self.issue_inner(request, now)).await;

		match &result {
			Ok(credential) => {
				self.metrics.record_issued();
				obs::record_lease_outcome(OPERATION, LeaseOutcome::Success);
				obs::emit_lease_event(LeaseEvent::Issued, &credential.lease);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_lease_outcome(OPERATION, LeaseOutcome::Failure);
			},
		}

		result
	}

	async fn issue_inner(
		&self,
		request: IssueRequest,
		now: OffsetDateTime,
	) -> Result<IssuedCredential> {
		let IssueRequest { tenant, identity, role, ttl } = request;
		let descriptor =
			self.roles.get(&role).ok_or_else(|| Error::UnknownRole { role: role.clone() })?;

		if !descriptor.admits(&tenant, &identity) {
			return Err(Error::IdentityNotBound {
				tenant,
				role,
				identity: identity.to_string(),
			});
		}

		let ttl = descriptor.effective_ttl(ttl)?;
		let guard = common::quota_guard(self, &tenant, &role);
		let _quota = guard.lock().await;

		if let Some(limit) = descriptor.max_active_leases_per_tenant {
			let active = self
				.store
				.list_tenant(&tenant)
				.await?
				.iter()
				.filter(|lease| lease.role == role && lease.is_active_at(now))
				.count();

			if active >= limit as usize {
				return Err(Error::QuotaExceeded { tenant, role, limit });
			}
		}

		let username = self.generator.username(&UsernameContext {
			tenant: &tenant,
			role: &role,
			identity: &identity,
			issued_at: now,
		});
		let password = self.generator.password();
		let expires_at = now
			.checked_add(ttl)
			.ok_or(ConfigError::LeaseBuild(LeaseRecordBuilderError::OutOfRange))?;
		let creation_ctx = StatementContext {
			name: &username,
			password: Some(&password),
			expiration: expires_at,
			tenant: &tenant,
			role: &role,
			database: &descriptor.database,
		};
		let creation = descriptor.render_creation(&creation_ctx).map_err(ConfigError::from)?;
		let revocation = descriptor
			.render_revocation(&StatementContext { password: None, ..creation_ctx })
			.map_err(ConfigError::from)?;
		let lease = LeaseRecord::builder(LeaseId::generate(&tenant, &role), tenant.clone(), role)
			.identity(identity)
			.username(username.as_str())
			.issued_at(now)
			.expires_at(expires_at)
			.max_ttl(descriptor.max_ttl)
			.revocation_statements(revocation)
			.build()
			.map_err(ConfigError::from)?;

		self.store.save(lease.clone()).await?;

		let batch = StatementBatch::new(
			StatementPurpose::Creation,
			lease.id.clone(),
			username.as_str(),
			creation,
		);

		if let Err(err) = self.backend.execute(&batch).await {
			self.abandon(&lease, &err, now).await;

			return Err(err.into());
		}

		Ok(IssuedCredential { lease, password })
	}

	/// Closes a lease whose creation batch failed.
	///
	/// A rejected batch rolled back, so the lease is revoked outright. When the database was
	/// unreachable the role may exist, so the lease expires now and the sweeper runs the
	/// idempotent revocation statements.
	///
	/// A store failure here leaves the lease active until its original expiry; it is logged and
	/// the backend error is still what the caller sees.
	async fn abandon(&self, lease: &LeaseRecord, err: &BackendError, now: OffsetDateTime) {
		let closed = if err.is_retryable() {
			let mut expired = lease.clone();

			expired.expires_at = now;

			self.store.compare_and_swap_expiry(&lease.id, lease.expires_at, expired).await.map(drop)
		} else {
			self.store.mark_revoked(&lease.id, now).await.map(drop)
		};

		if let Err(store_err) = closed {
			obs::emit_abandon_failure(lease, &store_err);
		}
	}
}
