//! Simple file-backed [`LeaseStore`] for single-replica deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{LeaseId, LeaseRecord, RevocationFailure, TenantId},
	store::{CompareAndSwapOutcome, LeaseStore, StoreError, StoreFuture, query},
};

/// Persists leases to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<LeaseId, LeaseRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<LeaseId, LeaseRecord>, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<LeaseRecord> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().map(|record| (record.id.clone(), record)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<LeaseId, LeaseRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot = contents.values().collect::<Vec<_>>();

		snapshot.sort_by(|a, b| a.id.cmp(&b.id));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn update_persisted(
		&self,
		id: &LeaseId,
		apply: impl FnOnce(&mut LeaseRecord),
	) -> Result<Option<LeaseRecord>, StoreError> {
		let mut guard = self.inner.write();
		let updated = match guard.get_mut(id) {
			Some(record) => {
				apply(record);

				Some(record.clone())
			},
			None => return Ok(None),
		};

		self.persist_locked(&guard)?;

		Ok(updated)
	}
}
impl LeaseStore for FileStore {
	fn save(&self, record: LeaseRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(record.id.clone(), record);
			self.persist_locked(&guard)
		})
	}

	fn fetch<'a>(&'a self, id: &'a LeaseId) -> StoreFuture<'a, Option<LeaseRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(id).cloned()) })
	}

	fn list_tenant<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<LeaseRecord>> {
		Box::pin(async move { Ok(query::tenant(self.inner.read().values(), tenant)) })
	}

	fn list_due(&self, now: OffsetDateTime, limit: usize) -> StoreFuture<'_, Vec<LeaseRecord>> {
		Box::pin(async move { Ok(query::due(self.inner.read().values(), now, limit)) })
	}

	fn compare_and_swap_expiry<'a>(
		&'a self,
		id: &'a LeaseId,
		expected_expires_at: OffsetDateTime,
		replacement: LeaseRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = match guard.get(id) {
				Some(existing)
					if existing.expires_at == expected_expires_at && !existing.is_revoked() =>
					CompareAndSwapOutcome::Updated,
				Some(_) => CompareAndSwapOutcome::ExpiryMismatch,
				None => CompareAndSwapOutcome::Missing,
			};

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				guard.insert(id.clone(), replacement);
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn mark_revoked<'a>(
		&'a self,
		id: &'a LeaseId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<LeaseRecord>> {
		Box::pin(async move {
			self.update_persisted(id, |record| {
				if !record.is_revoked() {
					record.revoke(instant);
				}
			})
		})
	}

	fn record_revocation_failure<'a>(
		&'a self,
		id: &'a LeaseId,
		failure: RevocationFailure,
	) -> StoreFuture<'a, Option<LeaseRecord>> {
		Box::pin(async move {
			self.update_persisted(id, |record| record.record_revocation_failure(failure))
		})
	}

	fn purge_revoked(&self, before: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let initial = guard.len();

			guard.retain(|_, record| !query::is_purgeable(record, before));

			let purged = initial - guard.len();

			if purged > 0 {
				self.persist_locked(&guard)?;
			}

			Ok(purged)
		})
	}
}
