//! Broker-level error types shared across the broker, stores, and backends.

// self
use crate::{
	_prelude::*,
	auth::{LeaseId, RoleName, TenantId},
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Database backend failure.
	#[error(transparent)]
	Backend(#[from] crate::backend::BackendError),

	/// The requested role is not registered with the broker.
	#[error("Role `{role}` is not registered.")]
	UnknownRole {
		/// Requested role name.
		role: RoleName,
	},
	/// The caller's workload identity is not bound to the role for this tenant.
	#[error("Workload identity `{identity}` is not bound to role `{role}` for tenant `{tenant}`.")]
	IdentityNotBound {
		/// Tenant named in the request.
		tenant: TenantId,
		/// Role named in the request.
		role: RoleName,
		/// Rendered workload identity.
		identity: String,
	},
	/// The tenant already holds the maximum number of active leases for the role.
	#[error("Tenant `{tenant}` reached the limit of {limit} active leases for role `{role}`.")]
	QuotaExceeded {
		/// Tenant named in the request.
		tenant: TenantId,
		/// Role named in the request.
		role: RoleName,
		/// Configured limit.
		limit: u32,
	},
	/// No lease exists for the provided identifier.
	#[error("Lease `{0}` does not exist.")]
	LeaseNotFound(LeaseId),
	/// The lease already expired and can no longer be renewed.
	#[error("Lease `{0}` has expired.")]
	LeaseExpired(LeaseId),
	/// The lease has been revoked and must not be reused.
	#[error("Lease `{0}` has been revoked.")]
	Revoked(LeaseId),
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration file could not be read.
	#[error("Failed to read configuration from {path}.")]
	Io {
		/// Path that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration payload is not valid JSON for the expected schema.
	#[error("Configuration is malformed at `{}`.", .source.path())]
	Parse {
		/// Structured parsing failure carrying the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A role entry failed validation.
	#[error("Role `{role}` is invalid.")]
	InvalidRole {
		/// Role name as written in the configuration.
		role: String,
		/// Validation failure.
		#[source]
		source: crate::role::RoleDescriptorError,
	},
	/// An identifier in the configuration failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Two role entries share the same name.
	#[error("Role `{0}` is declared more than once.")]
	DuplicateRole(RoleName),
	/// Sweeper settings are out of range.
	#[error("Sweeper setting `{field}` is invalid: {reason}.")]
	InvalidSweeper {
		/// Offending setting.
		field: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},

	/// Requested TTL is zero or negative.
	#[error("The requested TTL must be positive.")]
	NonPositiveTtl,
	/// Lease record builder validation failed.
	#[error("Unable to build lease record.")]
	LeaseBuild(#[from] crate::auth::LeaseRecordBuilderError),
	/// Statement rendering failed.
	#[error("Unable to render role statements.")]
	Template(#[from] crate::role::TemplateError),
}
impl ConfigError {
	/// Wraps a `serde_path_to_error` failure.
	pub fn parse(source: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { source }
	}
}
