// self
use crate::obs::{LeaseOperation, LeaseOutcome};

/// Records a lease operation outcome via the global metrics recorder (when enabled).
pub fn record_lease_outcome(operation: LeaseOperation, outcome: LeaseOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"credential_broker_lease_total",
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}
