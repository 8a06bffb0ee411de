//! Issues, renews, and revokes tenant credentials against the recording backend, then lets a
//! spawned sweeper drop a short-lived credential once it expires.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use time::Duration;
// self
use credential_broker::{
	auth::{RoleName, TenantId, WorkloadIdentity},
	backend::RecordingBackend,
	broker::{Broker, IssueRequest, RenewRequest},
	config::BrokerConfig,
	store::{LeaseStore, MemoryStore},
	sweeper::Sweeper,
};

const CONFIG: &str = r#"{
	"roles": [{
		"name": "readonly",
		"database": "orders",
		"creation_statements": [
			"CREATE ROLE \"{{name}}\" WITH LOGIN PASSWORD '{{password}}' VALID UNTIL '{{expiration}}';",
			"GRANT SELECT ON ALL TABLES IN SCHEMA public TO \"{{name}}\";"
		],
		"default_ttl_secs": 900,
		"max_ttl_secs": 3600,
		"bindings": [{ "tenant": "tenant-acme", "namespace": "acme", "service_account": "*" }]
	}],
	"sweeper": { "interval_secs": 1 }
}"#;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = BrokerConfig::from_json_str(CONFIG)?;
	let backend = RecordingBackend::default();
	let store: Arc<dyn LeaseStore> = Arc::new(MemoryStore::default());
	let broker = <Broker<RecordingBackend>>::new(backend.clone(), store, config.role_catalog()?);
	let tenant = TenantId::new("tenant-acme")?;
	let identity: WorkloadIdentity = "system:serviceaccount:acme:orders-api".parse()?;
	let role = RoleName::new("readonly")?;
	let credential =
		broker.issue(IssueRequest::new(tenant.clone(), identity.clone(), role.clone())).await?;

	println!(
		"Issued {} (password fingerprint {}) until {}.",
		credential.username(),
		credential.password.fingerprint(),
		credential.expires_at(),
	);

	let renewed = broker
		.renew(RenewRequest::new(credential.lease_id().clone()).with_increment(Duration::minutes(30)))
		.await?;

	println!("Renewed until {} (ceiling {}).", renewed.expires_at, renewed.max_expires_at);

	broker.revoke(credential.lease_id()).await?;

	let short_lived = broker
		.issue(IssueRequest::new(tenant.clone(), identity, role).with_ttl(Duration::seconds(1)))
		.await?;
	let sweeper = Sweeper::new(broker.clone(), config.sweeper.clone())?;
	let metrics = sweeper.metrics();
	let handle = sweeper.spawn();

	tokio::time::sleep(std::time::Duration::from_secs(3)).await;
	handle.shutdown().await?;

	println!(
		"Sweeper ran {} passes and revoked {} lease(s); {} still live: {}.",
		metrics.sweeps(),
		metrics.revoked(),
		short_lived.username(),
		backend.is_live(short_lived.username()),
	);

	for lease in broker.list_tenant(&tenant).await? {
		println!("{} -> {:?}", lease.id, lease.status());
	}

	Ok(())
}
