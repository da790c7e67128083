//! Start-up registration and shutdown teardown of webhook subscriptions.
//!
//! Every integration is handled on its own; one provider failing never
//! stops the others. Failures are logged and reported, not retried.

use hookbridge_api::Runtime;
use hookbridge_core::lifecycle::WebhookLifecycle;
use std::time::Duration;
use tracing::{error, info, warn};

/// What happened to each integration during a reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Integrations that ended in the desired state.
    pub succeeded: Vec<String>,

    /// Integrations the provider left half-done (no id on create, or a
    /// delete it refused). Their record is unchanged.
    pub incomplete: Vec<String>,

    /// Integrations whose operation returned an error, with its message.
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.incomplete.is_empty() && self.failed.is_empty()
    }

    fn record(&mut self, lifecycle: &WebhookLifecycle, outcome: Result<bool, String>) {
        let id = lifecycle.integration().to_string();
        match outcome {
            Ok(true) => self.succeeded.push(id),
            Ok(false) => self.incomplete.push(id),
            Err(message) => self.failed.push((id, message)),
        }
    }
}

/// Make sure every webhook integration has a provider subscription.
pub async fn register_all(runtime: &Runtime) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for lifecycle in runtime.lifecycles() {
        let outcome = lifecycle.ensure_registered().await;
        match &outcome {
            Ok(true) => info!(
                integration_id = %lifecycle.integration(),
                provider = %lifecycle.provider_name(),
                "Webhook subscription in place"
            ),
            Ok(false) => warn!(
                integration_id = %lifecycle.integration(),
                provider = %lifecycle.provider_name(),
                "Provider returned no subscription id; deliveries may not be routed"
            ),
            Err(e) => error!(
                integration_id = %lifecycle.integration(),
                provider = %lifecycle.provider_name(),
                error_kind = ?e.normalized().map(|n| n.kind),
                status_code = ?e.normalized().and_then(|n| n.status_code),
                error = %e,
                "Failed to register webhook subscription"
            ),
        }
        report.record(lifecycle, outcome.map_err(|e| e.to_string()));
    }

    report
}

/// Delete every webhook subscription, giving up after `timeout`.
///
/// Integrations not reached before the deadline are reported as failed.
pub async fn teardown_all(runtime: &Runtime, timeout: Duration) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let deadline = tokio::time::Instant::now() + timeout;

    for lifecycle in runtime.lifecycles() {
        let outcome = match tokio::time::timeout_at(deadline, lifecycle.delete()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("teardown deadline passed".to_string()),
        };

        match &outcome {
            Ok(true) => info!(integration_id = %lifecycle.integration(), "Webhook subscription removed"),
            Ok(false) => warn!(
                integration_id = %lifecycle.integration(),
                "Provider refused the delete; local record kept"
            ),
            Err(message) => error!(
                integration_id = %lifecycle.integration(),
                error = %message,
                "Failed to remove webhook subscription"
            ),
        }
        report.record(lifecycle, outcome);
    }

    report
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
