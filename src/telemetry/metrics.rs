//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::schema::Facet;

pub const ROUTES_REGISTERED: &str = "typed_router_routes_registered_total";
pub const VALIDATION_FAILURES: &str = "typed_router_validation_failures_total";
pub const ACCESS_DENIED: &str = "typed_router_access_denied_total";

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus
/// output includes HELP/TYPE lines from startup.
pub fn describe_metrics() {
    describe_counter!(ROUTES_REGISTERED, "Routes registered with the router, by method");
    describe_counter!(
        VALIDATION_FAILURES,
        "Requests halted by facet validation, by facet and failure kind"
    );
    describe_counter!(ACCESS_DENIED, "Requests halted by access control, by reason");

    for facet in Facet::CANONICAL_ORDER {
        for kind in ["malformed", "constraint"] {
            counter!(VALIDATION_FAILURES, "facet" => facet.as_str(), "kind" => kind).absolute(0);
        }
    }

    for reason in ["unreadable_credentials", "unknown_scope", "scope_mismatch"] {
        counter!(ACCESS_DENIED, "reason" => reason).absolute(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_metrics_without_recorder() {
        // No global recorder installed: calls are no-ops and must not panic.
        describe_metrics();
    }

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [ROUTES_REGISTERED, VALIDATION_FAILURES, ACCESS_DENIED] {
            assert!(name.starts_with("typed_router_"));
            assert!(name.ends_with("_total"));
        }
    }
}
