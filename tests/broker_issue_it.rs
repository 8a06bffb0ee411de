mod common;

// crates.io
use time::{Duration, macros};
// self
use common::{Harness, T0, identity, readonly_builder, readonly_role, role_name, tenant};
use credential_broker::{
	backend::{StatementPurpose, memory::InjectedFailure},
	broker::IssueRequest,
	error::{ConfigError, Error},
	role::RoleDescriptor,
	store::LeaseStore,
};

fn request(tenant_name: &str, namespace: &str, account: &str, role: &str) -> IssueRequest {
	IssueRequest::new(tenant(tenant_name), identity(namespace, account), role_name(role))
}

fn quota_role(limit: u32) -> RoleDescriptor {
	readonly_builder().max_active_leases_per_tenant(limit).build().expect("Role should build.")
}

#[tokio::test]
async fn issue_creates_role_and_persists_lease_without_password() {
	let harness = Harness::readonly();
	let credential = harness.issue_acme(T0).await;
	let lease = &credential.lease;

	assert_eq!(lease.tenant, tenant("acme"));
	assert_eq!(lease.identity, identity("acme", "api"));
	assert_eq!(lease.issued_at, T0);
	assert_eq!(lease.expires_at, T0 + Duration::hours(1));
	assert_eq!(lease.max_expires_at, T0 + Duration::hours(4));
	assert!(lease.id.belongs_to(&tenant("acme")));
	assert!(credential.username().starts_with("v-acme-readonly-"));
	assert!(harness.backend.is_live(credential.username()));

	let creations = harness.backend.executed_for(StatementPurpose::Creation);

	assert_eq!(creations.len(), 1);
	assert_eq!(
		creations[0].statements[0],
		format!(
			"CREATE ROLE \"{}\" WITH LOGIN PASSWORD '{}' VALID UNTIL '2025-01-01 01:00:00+00';",
			credential.username(),
			credential.password.expose(),
		)
	);
	assert_eq!(
		lease.revocation_statements,
		[format!("DROP ROLE IF EXISTS \"{}\";", credential.username())]
	);

	let stored = harness
		.store
		.fetch(credential.lease_id())
		.await
		.expect("Fetching the issued lease should succeed.")
		.expect("Issued lease should be persisted.");
	let serialized = serde_json::to_string(&stored).expect("Lease should serialize.");

	assert!(!serialized.contains(credential.password.expose()));
	assert_eq!(harness.broker.metrics.issued(), 1);
}

#[tokio::test]
async fn issue_rejects_unknown_roles_and_unbound_identities() {
	let harness = Harness::readonly();
	let unknown = harness
		.broker
		.issue_at(request("acme", "acme", "api", "admin"), T0)
		.await
		.expect_err("Unknown roles should be rejected.");

	assert!(matches!(unknown, Error::UnknownRole { ref role } if *role == role_name("admin")));

	// Right namespace, wrong tenant.
	let cross_tenant = harness
		.broker
		.issue_at(request("globex", "acme", "api", "readonly"), T0)
		.await
		.expect_err("Identities bound to another tenant should be rejected.");

	assert!(matches!(
		cross_tenant,
		Error::IdentityNotBound { ref identity, .. } if identity == "acme/api"
	));

	// `globex` binds a single service account, not the whole namespace.
	let wrong_account = harness
		.broker
		.issue_at(
			request("globex", "globex", "batch", "readonly"),
			T0,
		)
		.await
		.expect_err("Unbound service accounts should be rejected.");

	assert!(matches!(wrong_account, Error::IdentityNotBound { .. }));

	harness
		.broker
		.issue_at(
			request("globex", "globex", "reporting", "readonly"),
			T0,
		)
		.await
		.expect("The bound service account should be admitted.");

	assert_eq!(harness.store.len(), 1);
	assert_eq!(harness.broker.metrics.failures(), 3);
}

#[tokio::test]
async fn requested_ttl_is_clamped_and_must_be_positive() {
	let harness = Harness::readonly();
	let request = request("acme", "acme", "api", "readonly");
	let clamped = harness
		.broker
		.issue_at(request.clone().with_ttl(Duration::days(2)), T0)
		.await
		.expect("Oversized TTLs should be clamped, not rejected.");

	assert_eq!(clamped.expires_at(), T0 + Duration::hours(4));

	let err = harness
		.broker
		.issue_at(request.with_ttl(Duration::ZERO), T0)
		.await
		.expect_err("Zero TTL should be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::NonPositiveTtl)));
}

#[tokio::test]
async fn quota_counts_only_active_leases() {
	let harness = Harness::new([quota_role(2)]);
	let first = harness.issue_acme(T0).await;

	harness.issue_acme(T0).await;

	let err = harness
		.broker
		.issue_at(request("acme", "acme", "api", "readonly"), T0)
		.await
		.expect_err("A third active lease should exceed the quota.");

	assert!(matches!(err, Error::QuotaExceeded { limit: 2, .. }));

	// Another tenant has its own budget.
	harness
		.broker
		.issue_at(
			request("globex", "globex", "reporting", "readonly"),
			T0,
		)
		.await
		.expect("Quota is tracked per tenant.");

	harness.broker.revoke_at(first.lease_id(), T0).await.expect("Revocation should succeed.");
	harness.issue_acme(T0).await;

	// Both remaining leases have expired by now, freeing the budget.
	let later = T0 + Duration::hours(2);

	harness.issue_acme(later).await;
	harness.issue_acme(later).await;
}

#[tokio::test]
async fn concurrent_issues_never_exceed_quota() {
	let harness = Harness::new([quota_role(1)]);
	let request = request("acme", "acme", "api", "readonly");
	let (a, b) = tokio::join!(
		harness.broker.issue_at(request.clone(), T0),
		harness.broker.issue_at(request, T0)
	);

	assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
	assert_eq!(harness.backend.live_roles().len(), 1);
}

#[tokio::test]
async fn rejected_creation_revokes_the_write_ahead_lease() {
	let harness = Harness::readonly();

	harness
		.backend
		.fail_next(StatementPurpose::Creation, InjectedFailure::Rejected("permission denied".into()));

	let err = harness
		.broker
		.issue_at(request("acme", "acme", "api", "readonly"), T0)
		.await
		.expect_err("Rejected creation should fail the issuance.");

	assert!(matches!(err, Error::Backend(_)));

	let leases = harness.broker.list_tenant(&tenant("acme")).await.expect("Listing should succeed.");

	assert_eq!(leases.len(), 1);
	assert_eq!(leases[0].revoked_at, Some(T0));
	assert!(harness.backend.live_roles().is_empty());
}

#[tokio::test]
async fn unreachable_database_leaves_lease_due_for_cleanup() {
	let harness = Harness::readonly();

	harness.backend.fail_next(StatementPurpose::Creation, InjectedFailure::Unavailable);

	harness
		.broker
		.issue_at(request("acme", "acme", "api", "readonly"), T0)
		.await
		.expect_err("Unavailable database should fail the issuance.");

	let due = harness.store.list_due(T0, 10).await.expect("Listing due leases should succeed.");

	assert_eq!(due.len(), 1);
	assert_eq!(due[0].expires_at, T0);
	assert!(!due[0].is_revoked());
}

#[tokio::test]
async fn store_failure_while_closing_keeps_the_backend_error() {
	let (harness, store) = Harness::scripted([readonly_role()]);

	store.fail_mark_revoked();
	harness
		.backend
		.fail_next(StatementPurpose::Creation, InjectedFailure::Rejected("permission denied".into()));

	let err = harness
		.broker
		.issue_at(request("acme", "acme", "api", "readonly"), T0)
		.await
		.expect_err("Rejected creation should fail the issuance.");

	assert!(matches!(err, Error::Backend(ref backend) if !backend.is_retryable()));
	assert_eq!(store.mark_revoked_calls(), 1);

	// The lease could not be closed, so it stays active until its original expiry.
	let leases = harness.store.list_tenant(&tenant("acme")).await.expect("Listing should succeed.");

	assert_eq!(leases.len(), 1);
	assert!(leases[0].is_active_at(T0));
	assert_eq!(harness.broker.metrics.failures(), 1);
}

#[tokio::test]
async fn issuing_near_the_end_of_the_time_range_is_an_error() {
	let harness = Harness::readonly();
	let err = harness
		.broker
		.issue_at(
			request("acme", "acme", "api", "readonly"),
			macros::datetime!(9999-12-31 22:00 UTC),
		)
		.await
		.expect_err("A ceiling past the representable range should be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::LeaseBuild(_))));
	assert!(harness.store.is_empty());
	assert!(harness.backend.executed().is_empty());
}
