//! Role descriptors (data) plus the catalog the broker resolves requests against.

/// Builder API for assembling role descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, RoleName, TenantId, WorkloadIdentity, id},
	error::ConfigError,
	role::statement::{self, StatementContext, StatementTemplate, TemplateError},
};

/// Wildcard accepted in [`IdentityBinding::service_account`].
pub const ANY_SERVICE_ACCOUNT: &str = "*";

/// Grants one tenant's workloads in a namespace access to a role.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityBinding {
	/// Tenant the binding applies to.
	pub tenant: TenantId,
	/// Kubernetes namespace the workload must run in.
	pub namespace: String,
	/// Service account name, or `*` for any service account in the namespace.
	pub service_account: String,
}
impl IdentityBinding {
	/// Creates a validated binding.
	pub fn new(
		tenant: TenantId,
		namespace: impl Into<String>,
		service_account: impl Into<String>,
	) -> Result<Self, IdentifierError> {
		let namespace = namespace.into();
		let service_account = service_account.into();

		id::validate_fragment("Namespace", &namespace)?;

		if service_account != ANY_SERVICE_ACCOUNT {
			id::validate_fragment("ServiceAccount", &service_account)?;
		}

		Ok(Self { tenant, namespace, service_account })
	}

	/// Returns `true` when the binding admits `identity` acting for `tenant`.
	pub fn admits(&self, tenant: &TenantId, identity: &WorkloadIdentity) -> bool {
		self.tenant == *tenant
			&& self.namespace == identity.namespace()
			&& (self.service_account == ANY_SERVICE_ACCOUNT
				|| self.service_account == identity.service_account())
	}
}

/// Immutable role descriptor consumed by the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleDescriptor {
	/// Role name requested by callers.
	pub name: RoleName,
	/// Database the role's statements target.
	pub database: String,
	/// Statements that create the credential; may reference `{{password}}`.
	pub creation_statements: Vec<StatementTemplate>,
	/// Statements that extend the credential's validity.
	pub renew_statements: Vec<StatementTemplate>,
	/// Statements that drop the credential.
	pub revocation_statements: Vec<StatementTemplate>,
	/// TTL applied when the caller does not request one.
	pub default_ttl: Duration,
	/// Hard ceiling for the lifetime of a lease, renewals included.
	pub max_ttl: Duration,
	/// Tenant/workload pairs allowed to request the role.
	pub bindings: Vec<IdentityBinding>,
	/// Optional cap on concurrently active leases per tenant.
	pub max_active_leases_per_tenant: Option<u32>,
}
impl RoleDescriptor {
	/// Creates a new builder for the provided role name.
	pub fn builder(name: RoleName) -> RoleDescriptorBuilder {
		RoleDescriptorBuilder::new(name)
	}

	/// Returns `true` if any binding admits `identity` acting for `tenant`.
	pub fn admits(&self, tenant: &TenantId, identity: &WorkloadIdentity) -> bool {
		self.bindings.iter().any(|binding| binding.admits(tenant, identity))
	}

	/// Resolves the effective TTL: the request (or default) clamped to `max_ttl`.
	pub fn effective_ttl(&self, requested: Option<Duration>) -> Result<Duration, ConfigError> {
		let ttl = requested.unwrap_or(self.default_ttl);

		if !ttl.is_positive() {
			return Err(ConfigError::NonPositiveTtl);
		}

		Ok(ttl.min(self.max_ttl))
	}

	/// Renders the creation statements.
	pub fn render_creation(&self, ctx: &StatementContext<'_>) -> Result<Vec<String>, TemplateError> {
		statement::render_all(&self.creation_statements, ctx)
	}

	/// Renders the renew statements.
	pub fn render_renewal(&self, ctx: &StatementContext<'_>) -> Result<Vec<String>, TemplateError> {
		statement::render_all(&self.renew_statements, ctx)
	}

	/// Renders the revocation statements.
	pub fn render_revocation(
		&self,
		ctx: &StatementContext<'_>,
	) -> Result<Vec<String>, TemplateError> {
		statement::render_all(&self.revocation_statements, ctx)
	}
}

/// Set of roles the broker can issue, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct RoleCatalog(HashMap<RoleName, RoleDescriptor>);
impl RoleCatalog {
	/// Builds a catalog, rejecting duplicate names.
	pub fn new<I>(roles: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = RoleDescriptor>,
	{
		let mut map = HashMap::new();

		for role in roles {
			if map.contains_key(&role.name) {
				return Err(ConfigError::DuplicateRole(role.name));
			}

			map.insert(role.name.clone(), role);
		}

		Ok(Self(map))
	}

	/// Looks up a role by name.
	pub fn get(&self, name: &str) -> Option<&RoleDescriptor> {
		self.0.get(name)
	}

	/// Number of registered roles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no roles are registered.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over registered roles in arbitrary order.
	pub fn iter(&self) -> impl Iterator<Item = &RoleDescriptor> {
		self.0.values()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn tenant(value: &str) -> TenantId {
		TenantId::new(value).expect("Tenant fixture should be valid.")
	}

	#[test]
	fn bindings_match_namespace_and_service_account() {
		let exact = IdentityBinding::new(tenant("acme"), "acme-prod", "api")
			.expect("Exact binding should be valid.");
		let wildcard = IdentityBinding::new(tenant("acme"), "acme-jobs", ANY_SERVICE_ACCOUNT)
			.expect("Wildcard binding should be valid.");
		let api = WorkloadIdentity::new("acme-prod", "api").expect("Identity should be valid.");
		let worker =
			WorkloadIdentity::new("acme-prod", "worker").expect("Identity should be valid.");
		let job = WorkloadIdentity::new("acme-jobs", "nightly").expect("Identity should be valid.");

		assert!(exact.admits(&tenant("acme"), &api));
		assert!(!exact.admits(&tenant("acme"), &worker));
		assert!(!exact.admits(&tenant("globex"), &api), "Bindings never cross tenants.");
		assert!(wildcard.admits(&tenant("acme"), &job));
		assert!(IdentityBinding::new(tenant("acme"), "*", "api").is_err());
	}

	#[test]
	fn catalog_rejects_duplicates() {
		let build = || {
			RoleDescriptor::builder(RoleName::new("readonly").expect("Role should be valid."))
				.database("orders")
				.creation_statement("CREATE ROLE \"{{name}}\" LOGIN PASSWORD '{{password}}';")
				.bind(tenant("acme"), "acme", "api")
				.build()
				.expect("Role fixture should build.")
		};
		let err = RoleCatalog::new([build(), build()]).expect_err("Duplicates must be rejected.");

		assert!(matches!(err, ConfigError::DuplicateRole(_)));

		let catalog = RoleCatalog::new([build()]).expect("Single role should be accepted.");

		assert_eq!(catalog.len(), 1);
		assert!(catalog.get("readonly").is_some());
		assert!(catalog.get("admin").is_none());
	}

	#[test]
	fn effective_ttl_defaults_and_clamps() {
		let role = RoleDescriptor::builder(RoleName::new("ro").expect("Role should be valid."))
			.database("orders")
			.creation_statement("CREATE ROLE \"{{name}}\";")
			.bind(tenant("acme"), "acme", "api")
			.default_ttl(Duration::minutes(15))
			.max_ttl(Duration::hours(1))
			.build()
			.expect("Role fixture should build.");

		assert_eq!(role.effective_ttl(None).expect("Default TTL applies."), Duration::minutes(15));
		assert_eq!(
			role.effective_ttl(Some(Duration::hours(8))).expect("Large TTL is clamped."),
			Duration::hours(1)
		);
		assert!(matches!(
			role.effective_ttl(Some(Duration::ZERO)),
			Err(ConfigError::NonPositiveTtl)
		));
	}
}
