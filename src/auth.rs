//! Tenant identifiers, workload identities, credential secrets, and lease models.

pub mod id;
pub mod identity;
pub mod lease;
pub mod secret;

pub use id::*;
pub use identity::*;
pub use lease::*;
pub use secret::*;
