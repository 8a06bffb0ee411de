// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for broker lease operations.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
	issued: AtomicU64,
	renewed: AtomicU64,
	revoked: AtomicU64,
	failures: AtomicU64,
}
impl BrokerMetrics {
	/// Returns the number of credentials issued.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that moved an expiry forward.
	pub fn renewed(&self) -> u64 {
		self.renewed.load(Ordering::Relaxed)
	}

	/// Returns the number of leases revoked (explicitly or by the sweeper).
	pub fn revoked(&self) -> u64 {
		self.revoked.load(Ordering::Relaxed)
	}

	/// Returns the number of operations that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_issued(&self) {
		self.issued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewed(&self) {
		self.renewed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revoked(&self) {
		self.revoked.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
