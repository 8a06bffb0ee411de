//! Strongly typed identifiers enforced across the broker domain.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $extra:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view, $extra)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value, $extra)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const LEASE_NONCE_LEN: usize = 24;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, role, lease).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (tenant, role, lease).
		kind: &'static str,
	},
	/// The identifier contains a character outside `[A-Za-z0-9._-]`.
	#[error("{kind} identifier contains the disallowed character {character:?}.")]
	InvalidCharacter {
		/// Kind of identifier (tenant, role, lease).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// A composite identifier is missing its separator.
	#[error("{kind} identifier must be written as {expected}.")]
	Malformed {
		/// Kind of identifier.
		kind: &'static str,
		/// Accepted shape.
		expected: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, role, lease).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { TenantId, "Unique identifier for a broker tenant.", "Tenant", &[] }
def_id! { RoleName, "Name of a database role template registered with the broker.", "Role", &[] }
def_id! { LeaseId, "Identifier for an issued credential lease.", "Lease", &['/'] }
impl LeaseId {
	/// Generates a fresh `<tenant>/<role>/<nonce>` identifier.
	pub fn generate(tenant: &TenantId, role: &RoleName) -> Self {
		let nonce: String =
			rand::rng().sample_iter(Alphanumeric).take(LEASE_NONCE_LEN).map(char::from).collect();

		// Both prefixes are validated identifiers, so the composite always validates.
		Self(format!("{tenant}/{role}/{nonce}"))
	}

	/// Returns `true` when the lease was issued for the provided tenant.
	pub fn belongs_to(&self, tenant: &TenantId) -> bool {
		self.0.strip_prefix(tenant.as_ref()).is_some_and(|rest| rest.starts_with('/'))
	}
}

/// Validates a name fragment that will be interpolated into SQL (`[A-Za-z0-9._-]`).
pub(crate) fn validate_fragment(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	validate_view(kind, view, &[])
}

fn validate_view(kind: &'static str, view: &str, extra: &[char]) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}
	if let Some(character) = view.chars().find(|c| !is_allowed(*c) && !extra.contains(c)) {
		return Err(IdentifierError::InvalidCharacter { kind, character });
	}

	Ok(())
}

fn is_allowed(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}
