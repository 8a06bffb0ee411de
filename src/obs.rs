//! Optional observability helpers for lease operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `credential_broker.lease` with the
//!   `operation` and `stage` (call site) fields, plus `info`/`warn` lease events.
//! - Enable `metrics` to increment the `credential_broker_lease_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Lease operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeaseOperation {
	/// Credential issuance.
	Issue,
	/// Lease renewal.
	Renew,
	/// Explicit revocation.
	Revoke,
	/// Revocation sweep pass.
	Sweep,
}
impl LeaseOperation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LeaseOperation::Issue => "issue",
			LeaseOperation::Renew => "renew",
			LeaseOperation::Revoke => "revoke",
			LeaseOperation::Sweep => "sweep",
		}
	}
}
impl Display for LeaseOperation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeaseOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl LeaseOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LeaseOutcome::Attempt => "attempt",
			LeaseOutcome::Success => "success",
			LeaseOutcome::Failure => "failure",
		}
	}
}
impl Display for LeaseOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
