//! JSON configuration for roles and the sweeper.
//!
//! Durations are whole seconds. Role entries are turned into [`RoleDescriptor`]s through the
//! builder, so a file and hand-written code share one set of validation rules. Parse failures
//! name the JSON path that broke.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{RoleName, TenantId},
	error::ConfigError,
	role::{RoleCatalog, RoleDescriptor},
	sweeper::SweeperConfig,
};

/// Top-level broker configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
	/// Roles the broker can issue.
	pub roles: Vec<RoleConfig>,
	/// Sweeper settings; defaults apply when omitted.
	#[serde(default)]
	pub sweeper: SweeperConfig,
}
impl BrokerConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(ConfigError::parse)?;

		config.sweeper.validate()?;

		Ok(config)
	}

	/// Reads and parses a JSON file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let json = fs::read_to_string(path)
			.map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;

		Self::from_json_str(&json)
	}

	/// Builds the role catalog, validating every entry.
	pub fn role_catalog(&self) -> Result<RoleCatalog, ConfigError> {
		let descriptors =
			self.roles.iter().map(RoleConfig::to_descriptor).collect::<Result<Vec<_>, _>>()?;

		RoleCatalog::new(descriptors)
	}
}

/// One role entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
	/// Role name used in issue requests.
	pub name: String,
	/// Target database.
	pub database: String,
	/// Statements that create the credential.
	pub creation_statements: Vec<String>,
	/// Statements that extend the credential; built-in default when omitted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub renew_statements: Option<Vec<String>>,
	/// Statements that drop the credential; built-in default when omitted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revocation_statements: Option<Vec<String>>,
	/// Lifetime used when a request names none.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_ttl_secs: Option<u64>,
	/// Hard lifetime ceiling, renewals included.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_ttl_secs: Option<u64>,
	/// Workloads allowed to request the role.
	pub bindings: Vec<BindingConfig>,
	/// Per-tenant cap on active leases.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_active_leases_per_tenant: Option<u32>,
}
impl RoleConfig {
	/// Validates the entry and converts it into a descriptor.
	pub fn to_descriptor(&self) -> Result<RoleDescriptor, ConfigError> {
		let mut builder = RoleDescriptor::builder(RoleName::new(&self.name)?)
			.database(self.database.as_str())
			.creation_statements(self.creation_statements.iter().cloned());

		if let Some(statements) = &self.renew_statements {
			builder = builder.renew_statements(statements.iter().cloned());
		}
		if let Some(statements) = &self.revocation_statements {
			builder = builder.revocation_statements(statements.iter().cloned());
		}
		if let Some(secs) = self.default_ttl_secs {
			builder = builder.default_ttl(seconds(secs));
		}
		if let Some(secs) = self.max_ttl_secs {
			builder = builder.max_ttl(seconds(secs));
		}
		if let Some(limit) = self.max_active_leases_per_tenant {
			builder = builder.max_active_leases_per_tenant(limit);
		}

		for binding in &self.bindings {
			builder = builder.bind(
				TenantId::new(&binding.tenant)?,
				binding.namespace.as_str(),
				binding.service_account.as_str(),
			);
		}

		builder
			.build()
			.map_err(|source| ConfigError::InvalidRole { role: self.name.clone(), source })
	}
}

/// Grants a tenant's workloads access to a role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
	/// Tenant the workloads act for.
	pub tenant: String,
	/// Kubernetes namespace of the workloads.
	pub namespace: String,
	/// Service account name, or `*` for any in the namespace.
	pub service_account: String,
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
