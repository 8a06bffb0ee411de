mod common;

// crates.io
use time::Duration;
// self
use common::{T0, identity, role_name, tenant};
use credential_broker::{
	auth::{LeaseId, LeaseRecord, RevocationFailure},
	store::{CompareAndSwapOutcome, LeaseStore, MemoryStore},
};

fn build_lease(tenant_name: &str, issued_offset: Duration, ttl: Duration) -> LeaseRecord {
	let tenant = tenant(tenant_name);
	let role = role_name("readonly");

	LeaseRecord::builder(LeaseId::generate(&tenant, &role), tenant, role)
		.identity(identity(tenant_name, "api"))
		.username(format!("v-{tenant_name}-{}", issued_offset.whole_minutes()))
		.issued_at(T0 + issued_offset)
		.expires_in(ttl)
		.max_ttl(Duration::hours(4))
		.revocation_statements(["DROP ROLE IF EXISTS \"fixture\";"])
		.build()
		.expect("Lease fixture should build successfully.")
}

#[tokio::test]
async fn save_fetch_and_list_tenant_in_issue_order() {
	let store = MemoryStore::default();
	let later = build_lease("acme", Duration::minutes(10), Duration::hours(1));
	let earlier = build_lease("acme", Duration::ZERO, Duration::hours(1));
	let other = build_lease("globex", Duration::ZERO, Duration::hours(1));

	for lease in [later.clone(), earlier.clone(), other] {
		store.save(lease).await.expect("Saving lease fixture should succeed.");
	}

	let fetched = store
		.fetch(&earlier.id)
		.await
		.expect("Fetching a lease should succeed.")
		.expect("Saved lease should be present.");

	assert_eq!(fetched, earlier);

	let listed = store.list_tenant(&tenant("acme")).await.expect("Listing should succeed.");

	assert_eq!(listed.iter().map(|lease| &lease.id).collect::<Vec<_>>(), [&earlier.id, &later.id]);
	assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn list_due_orders_by_expiry_and_honors_limit_and_retry() {
	let store = MemoryStore::default();
	let short = build_lease("acme", Duration::ZERO, Duration::minutes(10));
	let shorter = build_lease("acme", Duration::ZERO, Duration::minutes(5));
	let active = build_lease("acme", Duration::ZERO, Duration::hours(2));
	let now = T0 + Duration::minutes(30);

	for lease in [short.clone(), shorter.clone(), active] {
		store.save(lease).await.expect("Saving lease fixture should succeed.");
	}

	let due = store.list_due(now, 10).await.expect("Listing due leases should succeed.");

	assert_eq!(due.iter().map(|lease| &lease.id).collect::<Vec<_>>(), [&shorter.id, &short.id]);

	let limited = store.list_due(now, 1).await.expect("Listing due leases should succeed.");

	assert_eq!(limited.len(), 1);
	assert_eq!(limited[0].id, shorter.id);

	store
		.record_revocation_failure(
			&shorter.id,
			RevocationFailure {
				message: "connection refused".into(),
				attempted_at: now,
				retry_at: now + Duration::minutes(1),
			},
		)
		.await
		.expect("Recording a failure should succeed.")
		.expect("Lease should exist.");

	let due = store.list_due(now, 10).await.expect("Listing due leases should succeed.");

	assert_eq!(due.iter().map(|lease| &lease.id).collect::<Vec<_>>(), [&short.id]);

	let due = store
		.list_due(now + Duration::minutes(1), 10)
		.await
		.expect("Listing due leases should succeed.");

	assert_eq!(due.len(), 2);
}

#[tokio::test]
async fn compare_and_swap_expiry_outcomes() {
	let store = MemoryStore::default();
	let lease = build_lease("acme", Duration::ZERO, Duration::hours(1));

	store.save(lease.clone()).await.expect("Saving lease fixture should succeed.");

	let renewed = lease.renewed_until(lease.expires_at + Duration::hours(1));
	let outcome = store
		.compare_and_swap_expiry(&lease.id, lease.expires_at, renewed.clone())
		.await
		.expect("CAS should succeed.");

	assert_eq!(outcome, CompareAndSwapOutcome::Updated);

	// The stored expiry moved, so the stale expectation no longer matches.
	let stale = store
		.compare_and_swap_expiry(&lease.id, lease.expires_at, lease.clone())
		.await
		.expect("CAS should succeed.");

	assert_eq!(stale, CompareAndSwapOutcome::ExpiryMismatch);

	let fetched = store.fetch(&lease.id).await.expect("Fetch should succeed.");

	assert_eq!(fetched.map(|lease| lease.renewals), Some(1));

	let missing = build_lease("acme", Duration::ZERO, Duration::hours(1));
	let outcome = store
		.compare_and_swap_expiry(&missing.id, missing.expires_at, missing.clone())
		.await
		.expect("CAS should succeed.");

	assert_eq!(outcome, CompareAndSwapOutcome::Missing);
}

#[tokio::test]
async fn revoked_leases_reject_cas_and_keep_first_revocation_instant() {
	let store = MemoryStore::default();
	let lease = build_lease("acme", Duration::ZERO, Duration::hours(1));
	let first = T0 + Duration::minutes(5);

	store.save(lease.clone()).await.expect("Saving lease fixture should succeed.");
	store
		.mark_revoked(&lease.id, first)
		.await
		.expect("Revocation should succeed.")
		.expect("Lease should exist.");

	let again = store
		.mark_revoked(&lease.id, first + Duration::minutes(5))
		.await
		.expect("Repeated revocation should succeed.")
		.expect("Lease should exist.");

	assert_eq!(again.revoked_at, Some(first));

	let renewed = lease.renewed_until(T0 + Duration::hours(2));
	let outcome = store
		.compare_and_swap_expiry(&lease.id, lease.expires_at, renewed)
		.await
		.expect("CAS should succeed.");

	assert_eq!(outcome, CompareAndSwapOutcome::ExpiryMismatch);
	assert!(
		store.list_due(T0 + Duration::hours(3), 10).await.expect("Listing should succeed.").is_empty()
	);
}

#[tokio::test]
async fn purge_removes_only_leases_revoked_before_cutoff() {
	let store = MemoryStore::default();
	let old = build_lease("acme", Duration::ZERO, Duration::hours(1));
	let recent = build_lease("acme", Duration::minutes(1), Duration::hours(1));
	let active = build_lease("acme", Duration::minutes(2), Duration::hours(1));

	for lease in [old.clone(), recent.clone(), active.clone()] {
		store.save(lease).await.expect("Saving lease fixture should succeed.");
	}

	store.mark_revoked(&old.id, T0).await.expect("Revocation should succeed.");
	store.mark_revoked(&recent.id, T0 + Duration::hours(2)).await.expect("Revocation should succeed.");

	let purged =
		store.purge_revoked(T0 + Duration::hours(1)).await.expect("Purge should succeed.");

	assert_eq!(purged, 1);
	assert!(store.fetch(&old.id).await.expect("Fetch should succeed.").is_none());
	assert!(store.fetch(&recent.id).await.expect("Fetch should succeed.").is_some());
	assert!(store.fetch(&active.id).await.expect("Fetch should succeed.").is_some());
}
