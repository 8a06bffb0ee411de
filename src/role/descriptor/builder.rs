// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, RoleName, TenantId, id},
	role::{
		IdentityBinding, RoleDescriptor,
		statement::{Placeholder, StatementTemplate, TemplateError},
	},
};

const DEFAULT_TTL: Duration = Duration::hours(1);
const DEFAULT_MAX_TTL: Duration = Duration::hours(24);
/// Longest lifetime any role may grant.
pub const MAX_TTL_CEILING: Duration = Duration::days(3_650);
const DEFAULT_RENEW_STATEMENT: &str = "ALTER ROLE \"{{name}}\" VALID UNTIL '{{expiration}}';";
const DEFAULT_REVOCATION_STATEMENT: &str = "DROP ROLE IF EXISTS \"{{name}}\";";

/// Errors raised while constructing or validating role descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum RoleDescriptorError {
	/// The target database was not configured.
	#[error("Missing database name.")]
	MissingDatabase,
	/// The database name is not a safe identifier.
	#[error("Database name is invalid.")]
	InvalidDatabase(#[source] IdentifierError),
	/// Roles need at least one creation statement.
	#[error("Role must declare at least one creation statement.")]
	MissingCreationStatements,
	/// Roles need at least one identity binding.
	#[error("Role must bind at least one tenant workload identity.")]
	NoBindings,
	/// A binding is malformed.
	#[error("Identity binding is invalid.")]
	InvalidBinding(#[source] IdentifierError),
	/// TTLs must be positive.
	#[error("The {which} TTL must be positive.")]
	NonPositiveTtl {
		/// Which TTL failed (`default` or `max`).
		which: &'static str,
	},
	/// The max TTL is longer than [`MAX_TTL_CEILING`].
	#[error("The max TTL exceeds the supported ceiling of {ceiling}.")]
	TtlAboveCeiling {
		/// Supported ceiling.
		ceiling: Duration,
	},
	/// The default TTL cannot exceed the ceiling.
	#[error("The default TTL exceeds the max TTL.")]
	DefaultTtlExceedsMax,
	/// A quota of zero would make the role unusable.
	#[error("The per-tenant lease quota must be at least 1.")]
	ZeroQuota,
	/// A statement template failed to parse.
	#[error("The {kind} statement `{statement}` is invalid.")]
	Template {
		/// Statement group (`creation`, `renew`, `revocation`).
		kind: &'static str,
		/// Statement as written.
		statement: String,
		/// Parser failure.
		#[source]
		source: TemplateError,
	},
	/// Passwords only exist during issuance; other statement groups cannot use them.
	#[error("The {kind} statements cannot reference {{{{password}}}}.")]
	PasswordOutsideCreation {
		/// Offending statement group.
		kind: &'static str,
	},
}

/// Builder for [`RoleDescriptor`] values.
#[derive(Debug)]
pub struct RoleDescriptorBuilder {
	/// Role name for the descriptor being constructed.
	pub name: RoleName,
	/// Target database.
	pub database: Option<String>,
	/// Raw creation statements.
	pub creation_statements: Vec<String>,
	/// Raw renew statements; the broker default applies when empty.
	pub renew_statements: Vec<String>,
	/// Raw revocation statements; the broker default applies when empty.
	pub revocation_statements: Vec<String>,
	/// TTL applied when callers do not request one.
	pub default_ttl: Duration,
	/// Lifetime ceiling.
	pub max_ttl: Duration,
	/// Identity bindings.
	pub bindings: Vec<IdentityBinding>,
	/// Raw bindings awaiting validation.
	pub pending_bindings: Vec<(TenantId, String, String)>,
	/// Optional per-tenant quota.
	pub max_active_leases_per_tenant: Option<u32>,
}
impl RoleDescriptorBuilder {
	/// Creates a new builder seeded with the provided role name.
	pub fn new(name: RoleName) -> Self {
		Self {
			name,
			database: None,
			creation_statements: Vec::new(),
			renew_statements: Vec::new(),
			revocation_statements: Vec::new(),
			default_ttl: DEFAULT_TTL,
			max_ttl: DEFAULT_MAX_TTL,
			bindings: Vec::new(),
			pending_bindings: Vec::new(),
			max_active_leases_per_tenant: None,
		}
	}

	/// Sets the target database.
	pub fn database(mut self, database: impl Into<String>) -> Self {
		self.database = Some(database.into());

		self
	}

	/// Appends a creation statement.
	pub fn creation_statement(mut self, statement: impl Into<String>) -> Self {
		self.creation_statements.push(statement.into());

		self
	}

	/// Replaces the creation statements.
	pub fn creation_statements<I, S>(mut self, statements: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.creation_statements = statements.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the renew statements.
	pub fn renew_statements<I, S>(mut self, statements: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.renew_statements = statements.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the revocation statements.
	pub fn revocation_statements<I, S>(mut self, statements: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.revocation_statements = statements.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the default TTL.
	pub fn default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = ttl;

		self
	}

	/// Overrides the lifetime ceiling.
	pub fn max_ttl(mut self, ttl: Duration) -> Self {
		self.max_ttl = ttl;

		self
	}

	/// Binds a tenant's workloads in `namespace` running as `service_account` (or `*`).
	pub fn bind(
		mut self,
		tenant: TenantId,
		namespace: impl Into<String>,
		service_account: impl Into<String>,
	) -> Self {
		self.pending_bindings.push((tenant, namespace.into(), service_account.into()));

		self
	}

	/// Adds already-validated bindings.
	pub fn bindings<I>(mut self, bindings: I) -> Self
	where
		I: IntoIterator<Item = IdentityBinding>,
	{
		self.bindings.extend(bindings);

		self
	}

	/// Caps concurrently active leases per tenant.
	pub fn max_active_leases_per_tenant(mut self, limit: u32) -> Self {
		self.max_active_leases_per_tenant = Some(limit);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<RoleDescriptor, RoleDescriptorError> {
		let database = self.database.ok_or(RoleDescriptorError::MissingDatabase)?;

		id::validate_fragment("Database", &database).map_err(RoleDescriptorError::InvalidDatabase)?;

		if self.creation_statements.is_empty() {
			return Err(RoleDescriptorError::MissingCreationStatements);
		}

		let creation_statements = parse_group("creation", self.creation_statements)?;
		let renew_statements =
			parse_group("renew", with_default(self.renew_statements, DEFAULT_RENEW_STATEMENT))?;
		let revocation_statements = parse_group(
			"revocation",
			with_default(self.revocation_statements, DEFAULT_REVOCATION_STATEMENT),
		)?;
		let mut bindings = self.bindings;

		for (tenant, namespace, service_account) in self.pending_bindings {
			bindings.push(
				IdentityBinding::new(tenant, namespace, service_account)
					.map_err(RoleDescriptorError::InvalidBinding)?,
			);
		}

		let descriptor = RoleDescriptor {
			name: self.name,
			database,
			creation_statements,
			renew_statements,
			revocation_statements,
			default_ttl: self.default_ttl,
			max_ttl: self.max_ttl,
			bindings,
			max_active_leases_per_tenant: self.max_active_leases_per_tenant,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl RoleDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), RoleDescriptorError> {
		if self.bindings.is_empty() {
			return Err(RoleDescriptorError::NoBindings);
		}
		if !self.default_ttl.is_positive() {
			return Err(RoleDescriptorError::NonPositiveTtl { which: "default" });
		}
		if !self.max_ttl.is_positive() {
			return Err(RoleDescriptorError::NonPositiveTtl { which: "max" });
		}
		if self.max_ttl > MAX_TTL_CEILING {
			return Err(RoleDescriptorError::TtlAboveCeiling { ceiling: MAX_TTL_CEILING });
		}
		if self.default_ttl > self.max_ttl {
			return Err(RoleDescriptorError::DefaultTtlExceedsMax);
		}
		if self.max_active_leases_per_tenant == Some(0) {
			return Err(RoleDescriptorError::ZeroQuota);
		}

		reject_password("renew", &self.renew_statements)?;
		reject_password("revocation", &self.revocation_statements)?;

		Ok(())
	}
}

fn with_default(statements: Vec<String>, fallback: &str) -> Vec<String> {
	if statements.is_empty() { vec![fallback.to_owned()] } else { statements }
}

fn parse_group(
	kind: &'static str,
	statements: Vec<String>,
) -> Result<Vec<StatementTemplate>, RoleDescriptorError> {
	statements
		.into_iter()
		.map(|statement| {
			StatementTemplate::parse(statement.clone())
				.map_err(|source| RoleDescriptorError::Template { kind, statement, source })
		})
		.collect()
}

fn reject_password(
	kind: &'static str,
	statements: &[StatementTemplate],
) -> Result<(), RoleDescriptorError> {
	if statements.iter().any(|statement| statement.references(Placeholder::Password)) {
		Err(RoleDescriptorError::PasswordOutsideCreation { kind })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn builder() -> RoleDescriptorBuilder {
		RoleDescriptor::builder(RoleName::new("readonly").expect("Role should be valid."))
			.database("orders")
			.creation_statement(
				"CREATE ROLE \"{{name}}\" WITH LOGIN PASSWORD '{{password}}' VALID UNTIL '{{expiration}}';",
			)
			.bind(TenantId::new("acme").expect("Tenant should be valid."), "acme", "api")
	}

	#[test]
	fn defaults_fill_renew_and_revocation() {
		let role = builder().build().expect("Role should build with defaults.");

		assert_eq!(role.renew_statements.len(), 1);
		assert_eq!(role.revocation_statements[0].as_str(), DEFAULT_REVOCATION_STATEMENT);
		assert_eq!(role.default_ttl, DEFAULT_TTL);
		assert_eq!(role.max_ttl, DEFAULT_MAX_TTL);
	}

	#[test]
	fn validation_failures_are_specific() {
		assert_eq!(
			builder().creation_statements(Vec::<String>::new()).build().unwrap_err(),
			RoleDescriptorError::MissingCreationStatements
		);
		assert_eq!(
			builder().default_ttl(Duration::hours(2)).max_ttl(Duration::hours(1)).build().unwrap_err(),
			RoleDescriptorError::DefaultTtlExceedsMax
		);
		assert_eq!(
			builder().default_ttl(Duration::ZERO).build().unwrap_err(),
			RoleDescriptorError::NonPositiveTtl { which: "default" }
		);
		assert_eq!(
			builder().max_ttl(MAX_TTL_CEILING + Duration::SECOND).build().unwrap_err(),
			RoleDescriptorError::TtlAboveCeiling { ceiling: MAX_TTL_CEILING }
		);
		assert!(builder().max_ttl(MAX_TTL_CEILING).build().is_ok());
		assert_eq!(
			builder().max_active_leases_per_tenant(0).build().unwrap_err(),
			RoleDescriptorError::ZeroQuota
		);
		assert_eq!(
			builder()
				.revocation_statements(["ALTER ROLE \"{{name}}\" PASSWORD '{{password}}';"])
				.build()
				.unwrap_err(),
			RoleDescriptorError::PasswordOutsideCreation { kind: "revocation" }
		);
		assert!(matches!(
			builder().database("orders; DROP").build().unwrap_err(),
			RoleDescriptorError::InvalidDatabase(_)
		));
		assert!(matches!(
			builder().renew_statements(["{{ttl}}"]).build().unwrap_err(),
			RoleDescriptorError::Template { kind: "renew", .. }
		));
	}

	#[test]
	fn bindings_are_required_and_validated() {
		let unbound = RoleDescriptor::builder(RoleName::new("ro").expect("Role should be valid."))
			.database("orders")
			.creation_statement("CREATE ROLE \"{{name}}\";")
			.build()
			.expect_err("Roles without bindings must be rejected.");

		assert_eq!(unbound, RoleDescriptorError::NoBindings);

		let err = builder()
			.bind(TenantId::new("acme").expect("Tenant should be valid."), "acme", "a b")
			.build()
			.expect_err("Malformed bindings must be rejected.");

		assert!(matches!(err, RoleDescriptorError::InvalidBinding(_)));
	}
}
