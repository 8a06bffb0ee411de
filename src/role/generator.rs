//! Credential generation hooks.
//!
//! The broker asks a [`CredentialGenerator`] for every username and password it issues, so
//! deployments can swap naming conventions (or plug in a password policy) without touching the
//! issuance path.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{CredentialSecret, RoleName, TenantId, WorkloadIdentity},
};

/// PostgreSQL truncates identifiers beyond `NAMEDATALEN - 1` bytes.
pub const MAX_USERNAME_LEN: usize = 63;

const NAME_FRAGMENT_LEN: usize = 16;
const USERNAME_NONCE_LEN: usize = 16;
const DEFAULT_PASSWORD_LEN: usize = 32;

/// Inputs available when naming a credential.
#[derive(Clone, Copy, Debug)]
pub struct UsernameContext<'a> {
	/// Tenant the credential is issued for.
	pub tenant: &'a TenantId,
	/// Role the credential is created from.
	pub role: &'a RoleName,
	/// Identity requesting the credential.
	pub identity: &'a WorkloadIdentity,
	/// Issuance instant.
	pub issued_at: OffsetDateTime,
}

/// Strategy that mints database usernames and passwords.
pub trait CredentialGenerator: Send + Sync {
	/// Returns a unique database username; must stay within [`MAX_USERNAME_LEN`] bytes and never
	/// contain `"`.
	fn username(&self, ctx: &UsernameContext<'_>) -> String;

	/// Returns a fresh password.
	fn password(&self) -> CredentialSecret;
}

/// `v-<tenant>-<role>-<nonce>-<unix>` usernames with random alphanumeric passwords.
#[derive(Clone, Debug)]
pub struct DefaultCredentialGenerator {
	/// Password length in characters.
	pub password_len: usize,
}
impl Default for DefaultCredentialGenerator {
	fn default() -> Self {
		Self { password_len: DEFAULT_PASSWORD_LEN }
	}
}
impl CredentialGenerator for DefaultCredentialGenerator {
	fn username(&self, ctx: &UsernameContext<'_>) -> String {
		let nonce = random_alphanumeric(USERNAME_NONCE_LEN).to_ascii_lowercase();
		let mut name = format!(
			"v-{}-{}-{nonce}-{}",
			fragment(ctx.tenant),
			fragment(ctx.role),
			ctx.issued_at.unix_timestamp(),
		);

		name.truncate(MAX_USERNAME_LEN);

		name
	}

	fn password(&self) -> CredentialSecret {
		CredentialSecret::new(random_alphanumeric(self.password_len))
	}
}

fn fragment(value: &str) -> &str {
	// Identifiers are ASCII, so any byte index is a char boundary.
	&value[..value.len().min(NAME_FRAGMENT_LEN)]
}

fn random_alphanumeric(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn usernames_are_prefixed_unique_and_bounded() {
		let tenant = TenantId::new("a-very-long-tenant-identifier-that-keeps-going")
			.expect("Tenant should be valid.");
		let role = RoleName::new("reporting-readonly-analytics").expect("Role should be valid.");
		let identity = WorkloadIdentity::new("acme", "api").expect("Identity should be valid.");
		let ctx = UsernameContext {
			tenant: &tenant,
			role: &role,
			identity: &identity,
			issued_at: macros::datetime!(2025-01-01 00:00 UTC),
		};
		let generator = DefaultCredentialGenerator::default();
		let first = generator.username(&ctx);
		let second = generator.username(&ctx);

		assert_ne!(first, second);
		assert!(first.starts_with("v-a-very-long-tena-reporting-readon-"));
		assert!(first.ends_with("-1735689600"));
		assert!(first.len() <= MAX_USERNAME_LEN);
		assert!(!first.contains('"'));
	}

	#[test]
	fn passwords_honor_length() {
		let generator = DefaultCredentialGenerator { password_len: 48 };
		let password = generator.password();

		assert_eq!(password.expose().len(), 48);
		assert!(password.expose().chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(password, generator.password());
	}
}
