//! Metrics and timing helpers for the mesh.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is bundled; a
//! host process may install any compatible recorder, otherwise recording is a
//! no-op.
//!
//! Provided metrics:
//! * `mesh_requests_total` (counter, label `status`)
//! * `mesh_request_duration_seconds` (histogram)
//! * `mesh_auth_requests_total` (counter, labels `variant`, `outcome`)
//! * `mesh_auth_request_duration_seconds` (histogram, label `operation`)
//! * `mesh_forward_requests_total` (counter, label `status`)
//!
//! [`ElapsedTimer`] logs and records its duration on `Drop`, so early returns
//! are measured too.
use std::time::{Duration, Instant};

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::Lazy;

pub const MESH_REQUESTS_TOTAL: &str = "mesh_requests_total";
pub const MESH_REQUEST_DURATION_SECONDS: &str = "mesh_request_duration_seconds";
pub const MESH_AUTH_REQUESTS_TOTAL: &str = "mesh_auth_requests_total";
pub const MESH_AUTH_REQUEST_DURATION_SECONDS: &str = "mesh_auth_request_duration_seconds";
pub const MESH_FORWARD_REQUESTS_TOTAL: &str = "mesh_forward_requests_total";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        MESH_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of inbound requests handled by the mesh."
    );
    describe_histogram!(
        MESH_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "End to end latency of inbound requests."
    );
    describe_counter!(
        MESH_AUTH_REQUESTS_TOTAL,
        Unit::Count,
        "Calls made to the integration service, by request variant and outcome."
    );
    describe_histogram!(
        MESH_AUTH_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of calls made to the integration service."
    );
    describe_counter!(
        MESH_FORWARD_REQUESTS_TOTAL,
        Unit::Count,
        "Requests forwarded to the application, by response status."
    );
});

/// Which histogram an [`ElapsedTimer`] feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedOperation {
    /// The full handling of one inbound request.
    Request,
    /// One call to the integration service.
    Authentication,
}

/// Scoped timer logging `"<operation> took <elapsed>"` when dropped.
pub struct ElapsedTimer {
    start: Instant,
    request_id: String,
    operation: &'static str,
    kind: TimedOperation,
}

impl ElapsedTimer {
    pub fn new(request_id: &str, operation: &'static str, kind: TimedOperation) -> Self {
        Self {
            start: Instant::now(),
            request_id: request_id.to_string(),
            operation,
            kind,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            request_id = %self.request_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "{} took {:?}",
            self.operation,
            elapsed
        );
        match self.kind {
            TimedOperation::Request => {
                histogram!(MESH_REQUEST_DURATION_SECONDS).record(elapsed.as_secs_f64());
            }
            TimedOperation::Authentication => {
                histogram!(MESH_AUTH_REQUEST_DURATION_SECONDS, "operation" => self.operation)
                    .record(elapsed.as_secs_f64());
            }
        }
    }
}

pub fn increment_request_total(status: u16) {
    counter!(MESH_REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
}

pub fn increment_auth_request_total(variant: &'static str, outcome: &'static str) {
    counter!(MESH_AUTH_REQUESTS_TOTAL, "variant" => variant, "outcome" => outcome).increment(1);
}

pub fn increment_forward_request_total(status: u16) {
    counter!(MESH_FORWARD_REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
}

/// Register metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    Lazy::force(&DESCRIPTIONS);
    tracing::debug!("Mesh metric descriptions registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_timer_measures() {
        let timer = ElapsedTimer::new("req-1", "Integration mesh", TimedOperation::Request);
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));
        drop(timer);
    }

    #[test]
    fn test_counters_without_recorder() {
        increment_request_total(200);
        increment_auth_request_total("salesforce", "authorized");
        increment_forward_request_total(502);
    }

    #[test]
    fn test_init_metrics() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }
}
