//! Kubernetes workload identity (namespace + service account) presented by callers.

// self
use crate::{
	_prelude::*,
	auth::id::{IdentifierError, validate_fragment},
};

const SUBJECT_PREFIX: &str = "system:serviceaccount:";

/// Namespace + service account pair a workload runs as.
///
/// The broker does not verify the identity against a cluster; callers are expected to pass the
/// identity established by their own admission path (projected token review, mTLS, etc.).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIdentity")]
pub struct WorkloadIdentity {
	namespace: String,
	service_account: String,
}
impl WorkloadIdentity {
	/// Creates a validated identity.
	pub fn new(
		namespace: impl Into<String>,
		service_account: impl Into<String>,
	) -> Result<Self, IdentifierError> {
		let namespace = namespace.into();
		let service_account = service_account.into();

		validate_fragment("Namespace", &namespace)?;
		validate_fragment("ServiceAccount", &service_account)?;

		Ok(Self { namespace, service_account })
	}

	/// Namespace component.
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Service account component.
	pub fn service_account(&self) -> &str {
		&self.service_account
	}

	/// Renders the identity in Kubernetes subject form.
	pub fn subject(&self) -> String {
		format!("{SUBJECT_PREFIX}{}:{}", self.namespace, self.service_account)
	}
}
impl Debug for WorkloadIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "WorkloadIdentity({}/{})", self.namespace, self.service_account)
	}
}
impl Display for WorkloadIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.namespace, self.service_account)
	}
}
impl FromStr for WorkloadIdentity {
	type Err = IdentifierError;

	/// Accepts `system:serviceaccount:<ns>:<name>` or `<ns>/<name>`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (namespace, service_account) = match s.strip_prefix(SUBJECT_PREFIX) {
			Some(rest) => rest.split_once(':'),
			None => s.split_once('/'),
		}
		.ok_or(IdentifierError::Malformed {
			kind: "WorkloadIdentity",
			expected: "`namespace/service_account` or a service-account subject",
		})?;

		Self::new(namespace, service_account)
	}
}

#[derive(Deserialize)]
struct RawIdentity {
	namespace: String,
	service_account: String,
}
impl TryFrom<RawIdentity> for WorkloadIdentity {
	type Error = IdentifierError;

	fn try_from(raw: RawIdentity) -> Result<Self, Self::Error> {
		Self::new(raw.namespace, raw.service_account)
	}
}
