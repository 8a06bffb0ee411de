//! Revocation sweeper: drops expired credentials and purges old lease records.
//!
//! [`Sweeper::sweep_once`] lists due leases (expired, or explicitly revoked without success) in
//! expiry order and revokes each through the broker, so the per-lease guard keeps it from racing
//! an explicit revocation or a renewal. Failures are rescheduled with exponential backoff. With
//! the `tokio` feature, [`Sweeper::spawn`] runs passes on a fixed interval until shut down.

mod metrics;

pub use metrics::SweepMetrics;

// self
use crate::{
	_prelude::*,
	backend::DatabaseBackend,
	broker::{Broker, RevocationAttempt, RevocationTrigger},
	error::ConfigError,
	obs::{self, LeaseOperation, LeaseOutcome, LeaseSpan},
};

/// Longest interval, backoff, or retention accepted, in seconds (ten years).
pub const MAX_SWEEPER_SECS: u64 = 315_360_000;

/// Sweeper settings, expressed in whole seconds for configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweeperConfig {
	/// Seconds between passes of a spawned sweeper.
	pub interval_secs: u64,
	/// Maximum leases examined per pass.
	pub batch_size: usize,
	/// Delay before the first retry of a failed revocation.
	pub base_backoff_secs: u64,
	/// Upper bound for the retry delay.
	pub max_backoff_secs: u64,
	/// How long revoked leases are kept before being purged; `None` keeps them forever.
	pub retention_secs: Option<u64>,
}
impl SweeperConfig {
	/// Pass interval.
	pub fn interval(&self) -> Duration {
		seconds(self.interval_secs)
	}

	/// Retention window for revoked leases, if purging is enabled.
	pub fn retention(&self) -> Option<Duration> {
		self.retention_secs.map(seconds)
	}

	/// Retry delay after the `attempts`-th consecutive failure:
	/// `min(base * 2^(attempts - 1), max)`.
	pub fn backoff_for(&self, attempts: u32) -> Duration {
		let factor = 1_u64.checked_shl(attempts.saturating_sub(1)).unwrap_or(u64::MAX);

		seconds(self.base_backoff_secs.saturating_mul(factor).min(self.max_backoff_secs))
	}

	/// Checks that every setting is usable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.interval_secs == 0 {
			return Err(ConfigError::InvalidSweeper {
				field: "interval_secs",
				reason: "must be positive",
			});
		}
		if self.batch_size == 0 {
			return Err(ConfigError::InvalidSweeper {
				field: "batch_size",
				reason: "must be positive",
			});
		}
		if self.base_backoff_secs == 0 {
			return Err(ConfigError::InvalidSweeper {
				field: "base_backoff_secs",
				reason: "must be positive",
			});
		}
		if self.max_backoff_secs < self.base_backoff_secs {
			return Err(ConfigError::InvalidSweeper {
				field: "max_backoff_secs",
				reason: "must not be smaller than base_backoff_secs",
			});
		}

		for (field, value) in [
			("interval_secs", Some(self.interval_secs)),
			("max_backoff_secs", Some(self.max_backoff_secs)),
			("retention_secs", self.retention_secs),
		] {
			if value.is_some_and(|secs| secs > MAX_SWEEPER_SECS) {
				return Err(ConfigError::InvalidSweeper {
					field,
					reason: "must not exceed ten years",
				});
			}
		}

		Ok(())
	}
}
impl Default for SweeperConfig {
	fn default() -> Self {
		Self {
			interval_secs: 30,
			batch_size: 256,
			base_backoff_secs: 5,
			max_backoff_secs: 300,
			retention_secs: Some(86_400),
		}
	}
}

/// Counts from a single sweep pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Due leases examined.
	pub examined: usize,
	/// Leases revoked by this pass.
	pub revoked: usize,
	/// Revocations that failed and were rescheduled.
	pub failed: usize,
	/// Revoked leases purged past retention.
	pub purged: usize,
}

/// Revokes due leases through a [`Broker`].
pub struct Sweeper<B>
where
	B: ?Sized + DatabaseBackend,
{
	broker: Broker<B>,
	config: SweeperConfig,
	metrics: Arc<SweepMetrics>,
}
impl<B> Sweeper<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Creates a sweeper after validating `config`.
	pub fn new(broker: Broker<B>, config: SweeperConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self { broker, config, metrics: Default::default() })
	}

	/// Active settings.
	pub fn config(&self) -> &SweeperConfig {
		&self.config
	}

	/// Shared counters across passes.
	pub fn metrics(&self) -> Arc<SweepMetrics> {
		self.metrics.clone()
	}

	/// Runs one pass as if the current instant were `now`.
	///
	/// Per-lease failures are counted and rescheduled; only store failures while listing or
	/// purging abort the pass.
	pub async fn sweep_once(&self, now: OffsetDateTime) -> Result<SweepReport> {
		const OPERATION: LeaseOperation = LeaseOperation::Sweep;

		let span = LeaseSpan::new(OPERATION, "sweep_once");

		obs::record_lease_outcome(OPERATION, LeaseOutcome::Attempt);
		self.metrics.record_sweep();

		let result = span.instrument(self.sweep_inner(now)).await;

		match &result {
			Ok(report) => {
				self.metrics.record_report(report);
				obs::record_lease_outcome(OPERATION, LeaseOutcome::Success);
				obs::emit_sweep_report(report);
			},
			Err(err) => {
				obs::record_lease_outcome(OPERATION, LeaseOutcome::Failure);
				obs::emit_sweep_error(err);
			},
		}

		result
	}

	async fn sweep_inner(&self, now: OffsetDateTime) -> Result<SweepReport> {
		let mut report = SweepReport::default();
		let due = self.broker.store.list_due(now, self.config.batch_size).await?;

		for lease in due {
			report.examined += 1;

			match self
				.broker
				.attempt_revocation(&lease.id, now, RevocationTrigger::Sweep(&self.config))
				.await
			{
				Ok(RevocationAttempt::Revoked(_)) => report.revoked += 1,
				Ok(RevocationAttempt::AlreadyRevoked(_) | RevocationAttempt::NotDue(_)) => {},
				Err(_) => report.failed += 1,
			}
		}

		// A cutoff before the earliest representable instant cannot match any lease.
		let cutoff = self.config.retention().and_then(|retention| now.checked_sub(retention));

		if let Some(cutoff) = cutoff {
			report.purged = self.broker.store.purge_revoked(cutoff).await?;
		}

		Ok(report)
	}
}
#[cfg(feature = "tokio")]
impl<B> Sweeper<B>
where
	B: ?Sized + DatabaseBackend,
{
	/// Runs passes every [`SweeperConfig::interval`] on the Tokio runtime.
	///
	/// The first pass starts immediately. Dropping the returned handle also stops the loop. Must
	/// be called from within a runtime.
	pub fn spawn(self) -> SweeperHandle {
		let (shutdown, mut signal) = tokio::sync::oneshot::channel();
		let period = std::time::Duration::from_secs(self.config.interval_secs);
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);

			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = &mut signal => break,
					_ = ticker.tick() => {
						// Failures are already logged and counted by `sweep_once`.
						let _ = self.sweep_once(OffsetDateTime::now_utc()).await;
					},
				}
			}
		});

		SweeperHandle { shutdown, task }
	}
}
impl<B> Debug for Sweeper<B>
where
	B: ?Sized + DatabaseBackend,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Sweeper").field("config", &self.config).field("metrics", &self.metrics).finish()
	}
}

/// Handle to a spawned sweeper task.
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct SweeperHandle {
	shutdown: tokio::sync::oneshot::Sender<()>,
	task: tokio::task::JoinHandle<()>,
}
#[cfg(feature = "tokio")]
impl SweeperHandle {
	/// Stops the loop after the in-flight pass (if any) and waits for the task to exit.
	///
	/// Returns the join error when the task panicked or was cancelled instead of exiting cleanly.
	pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
		// The receiver is gone only if the task already exited; the join below reports why.
		let _ = self.shutdown.send(());

		self.task.await.inspect_err(|err| obs::emit_sweep_error(err))
	}

	/// Returns `true` once the task has exited.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
