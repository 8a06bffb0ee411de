//! In-process [`DatabaseBackend`] that records batches for tests and demos.

// std
use std::{collections::VecDeque, io};
// self
use crate::{
	_prelude::*,
	backend::{BackendError, BackendFuture, DatabaseBackend, StatementBatch, StatementPurpose},
};

/// Failure to inject into the next batch of a given purpose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InjectedFailure {
	/// Surface as [`BackendError::Rejected`].
	Rejected(String),
	/// Surface as [`BackendError::Unavailable`].
	Unavailable,
}

#[derive(Debug, Default)]
struct RecordingState {
	executed: Vec<StatementBatch>,
	live: HashSet<String>,
	failures: HashMap<StatementPurpose, VecDeque<InjectedFailure>>,
}

/// Backend that applies batches to an in-memory set of live usernames.
///
/// Creation batches add the username, revocation batches remove it. Clones share state, so a test
/// can keep one handle while the broker owns another.
#[derive(Clone, Debug, Default)]
pub struct RecordingBackend(Arc<Mutex<RecordingState>>);
impl RecordingBackend {
	/// Queues a failure for the next batch with the given purpose.
	pub fn fail_next(&self, purpose: StatementPurpose, failure: InjectedFailure) {
		self.0.lock().failures.entry(purpose).or_default().push_back(failure);
	}

	/// Every successfully executed batch, in order.
	pub fn executed(&self) -> Vec<StatementBatch> {
		self.0.lock().executed.clone()
	}

	/// Successfully executed batches with the given purpose.
	pub fn executed_for(&self, purpose: StatementPurpose) -> Vec<StatementBatch> {
		self.0.lock().executed.iter().filter(|batch| batch.purpose == purpose).cloned().collect()
	}

	/// Usernames currently present in the simulated database, sorted.
	pub fn live_roles(&self) -> Vec<String> {
		let mut live = self.0.lock().live.iter().cloned().collect::<Vec<_>>();

		live.sort();

		live
	}

	/// Returns `true` if the username exists in the simulated database.
	pub fn is_live(&self, username: &str) -> bool {
		self.0.lock().live.contains(username)
	}

	fn execute_now(&self, batch: &StatementBatch) -> Result<(), BackendError> {
		let mut state = self.0.lock();

		if let Some(failure) =
			state.failures.get_mut(&batch.purpose).and_then(|queue| queue.pop_front())
		{
			return Err(match failure {
				InjectedFailure::Rejected(message) => BackendError::Rejected { message },
				InjectedFailure::Unavailable => BackendError::unavailable(io::Error::new(
					io::ErrorKind::ConnectionRefused,
					"simulated database outage",
				)),
			});
		}

		match batch.purpose {
			StatementPurpose::Creation => {
				state.live.insert(batch.username.clone());
			},
			StatementPurpose::Revocation => {
				state.live.remove(&batch.username);
			},
			StatementPurpose::Renewal => {},
		}

		state.executed.push(batch.clone());

		Ok(())
	}
}
impl DatabaseBackend for RecordingBackend {
	fn execute<'a>(&'a self, batch: &'a StatementBatch) -> BackendFuture<'a> {
		Box::pin(async move { self.execute_now(batch) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::auth::LeaseId;

	fn batch(purpose: StatementPurpose) -> StatementBatch {
		StatementBatch::new(
			purpose,
			LeaseId::new("acme/ro/abc").expect("Lease fixture should be valid."),
			"v-acme-ro",
			vec![format!("-- {purpose}")],
		)
	}

	#[test]
	fn tracks_live_roles_and_injected_failures() {
		let rt = Runtime::new().expect("Failed to build Tokio runtime for backend test.");
		let backend = RecordingBackend::default();

		rt.block_on(backend.execute(&batch(StatementPurpose::Creation)))
			.expect("Creation should succeed.");

		assert!(backend.is_live("v-acme-ro"));

		backend.fail_next(StatementPurpose::Revocation, InjectedFailure::Unavailable);

		let err = rt
			.block_on(backend.execute(&batch(StatementPurpose::Revocation)))
			.expect_err("Injected failure should surface.");

		assert!(err.is_retryable());
		assert!(backend.is_live("v-acme-ro"));

		rt.block_on(backend.execute(&batch(StatementPurpose::Revocation)))
			.expect("Second revocation should succeed.");

		assert!(backend.live_roles().is_empty());
		assert_eq!(backend.executed().len(), 2);
		assert_eq!(backend.executed_for(StatementPurpose::Revocation).len(), 1);
	}
}
