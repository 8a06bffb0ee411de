// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::sweeper::SweepReport;

/// Thread-safe counters accumulated across sweep passes.
#[derive(Debug, Default)]
pub struct SweepMetrics {
	sweeps: AtomicU64,
	revoked: AtomicU64,
	failed: AtomicU64,
	purged: AtomicU64,
}
impl SweepMetrics {
	/// Returns the number of passes started.
	pub fn sweeps(&self) -> u64 {
		self.sweeps.load(Ordering::Relaxed)
	}

	/// Returns the number of leases revoked by the sweeper.
	pub fn revoked(&self) -> u64 {
		self.revoked.load(Ordering::Relaxed)
	}

	/// Returns the number of failed revocation attempts.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of lease records purged.
	pub fn purged(&self) -> u64 {
		self.purged.load(Ordering::Relaxed)
	}

	pub(crate) fn record_sweep(&self) {
		self.sweeps.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_report(&self, report: &SweepReport) {
		self.revoked.fetch_add(report.revoked as u64, Ordering::Relaxed);
		self.failed.fetch_add(report.failed as u64, Ordering::Relaxed);
		self.purged.fetch_add(report.purged as u64, Ordering::Relaxed);
	}
}
