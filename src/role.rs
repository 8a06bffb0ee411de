//! Role templates (data) and credential generation (behavior).
//!
//! `descriptor` exposes validated [`RoleDescriptor`] metadata: target database, SQL statement
//! groups, TTL defaults and ceilings, identity bindings, and per-tenant quotas. `statement` parses
//! and renders the `{{placeholder}}` templates. `generator` defines [`CredentialGenerator`], the
//! hook that mints usernames and passwords.

pub mod descriptor;
pub mod generator;
pub mod statement;

pub use descriptor::*;
pub use generator::*;
pub use statement::*;
