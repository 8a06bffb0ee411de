// self
use crate::{_prelude::*, auth::LeaseRecord, obs::LeaseOperation, sweeper::SweepReport};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedLease<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedLease<F> = F;

/// Lifecycle transitions worth an `info` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseEvent {
	/// Credentials were created in the database.
	Issued,
	/// The lease expiry moved forward.
	Renewed,
	/// Credentials were dropped from the database.
	Revoked,
}
impl LeaseEvent {
	/// Returns a stable label suitable for event fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LeaseEvent::Issued => "issued",
			LeaseEvent::Renewed => "renewed",
			LeaseEvent::Revoked => "revoked",
		}
	}
}

/// A span builder used by broker operations.
#[derive(Clone, Debug)]
pub struct LeaseSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl LeaseSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(operation: LeaseOperation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"credential_broker.lease",
				operation = operation.as_str(),
				stage
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> LeaseSpanGuard {
		#[cfg(feature = "tracing")]
		{
			LeaseSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			LeaseSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedLease<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`LeaseSpan::entered`].
pub struct LeaseSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for LeaseSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("LeaseSpanGuard(..)")
	}
}

/// Emits an `info` event for a lease transition. Never carries secrets.
pub fn emit_lease_event(event: LeaseEvent, lease: &LeaseRecord) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			event = event.as_str(),
			lease_id = %lease.id,
			tenant = %lease.tenant,
			role = %lease.role,
			username = %lease.username,
			expires_at = %lease.expires_at,
			"lease {}",
			event.as_str()
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (event, lease);
	}
}

/// Emits a `warn` event for a failed revocation attempt.
pub fn emit_revocation_failure(lease: &LeaseRecord, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			lease_id = %lease.id,
			tenant = %lease.tenant,
			attempts = lease.revocation_attempts,
			next_revocation_at = ?lease.next_revocation_at,
			error = %error,
			"lease revocation failed"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (lease, error);
	}
}

/// Emits a `warn` event when a lease whose creation failed could not be closed in the store.
pub fn emit_abandon_failure(lease: &LeaseRecord, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			lease_id = %lease.id,
			tenant = %lease.tenant,
			expires_at = %lease.expires_at,
			error = %error,
			"failed lease could not be closed"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (lease, error);
	}
}

/// Emits an `info` event for a sweep pass that did any work.
pub fn emit_sweep_report(report: &SweepReport) {
	#[cfg(feature = "tracing")]
	{
		if report.examined > 0 || report.purged > 0 {
			tracing::info!(
				examined = report.examined,
				revoked = report.revoked,
				failed = report.failed,
				purged = report.purged,
				"sweep finished"
			);
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = report;
	}
}

/// Emits a `warn` event for a sweep pass aborted by a store failure.
pub fn emit_sweep_error(error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %error, "sweep aborted");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}
