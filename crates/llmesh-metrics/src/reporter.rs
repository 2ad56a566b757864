//! The metrics-reporting interface consumed by membership, the broadcaster,
//! and the RPC layer.
//!
//! Components never talk to a global registry. They hold a
//! [`MetricsHandle`], which forwards to an injected [`MetricsReporter`] when
//! one is configured and does nothing otherwise.

use std::sync::Arc;
use std::time::Duration;

use llmesh_core::{NodeStatus, ResourceInfo};

/// Message direction label for [`MetricsReporter::record_message`].
pub const INCOMING: &str = "incoming";
/// Message direction label for [`MetricsReporter::record_message`].
pub const OUTGOING: &str = "outgoing";

/// Sink for operational metrics.
pub trait MetricsReporter: Send + Sync {
    /// Count a network message (`direction` is `incoming` or `outgoing`).
    fn record_message(&self, direction: &str, kind: &str);

    /// Observe the latency of an operation against a target.
    fn record_latency(&self, target: &str, operation: &str, duration: Duration);

    fn update_node_status(&self, status: NodeStatus);

    /// Number of peers/connections currently known.
    fn update_connection_count(&self, count: usize);

    fn record_inference_request(&self, model_id: &str, status: &str, duration: Duration, tokens: u32);

    /// Publish the local resource snapshot. Optional for reporters.
    fn update_node_resources(&self, _resources: &ResourceInfo) {}
}

/// Shared reporter handed to every component.
pub type SharedReporter = Arc<dyn MetricsReporter>;

/// Nil-safe wrapper around an optional reporter.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    reporter: Option<SharedReporter>,
}

impl MetricsHandle {
    pub fn new(reporter: SharedReporter) -> Self {
        Self {
            reporter: Some(reporter),
        }
    }

    /// A handle that drops every observation.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.reporter.is_some()
    }

    pub fn record_message(&self, direction: &str, kind: &str) {
        if let Some(r) = &self.reporter {
            r.record_message(direction, kind);
        }
    }

    pub fn record_latency(&self, target: &str, operation: &str, duration: Duration) {
        if let Some(r) = &self.reporter {
            r.record_latency(target, operation, duration);
        }
    }

    pub fn update_node_status(&self, status: NodeStatus) {
        if let Some(r) = &self.reporter {
            r.update_node_status(status);
        }
    }

    pub fn update_connection_count(&self, count: usize) {
        if let Some(r) = &self.reporter {
            r.update_connection_count(count);
        }
    }

    pub fn record_inference_request(
        &self,
        model_id: &str,
        status: &str,
        duration: Duration,
        tokens: u32,
    ) {
        if let Some(r) = &self.reporter {
            r.record_inference_request(model_id, status, duration, tokens);
        }
    }

    pub fn update_node_resources(&self, resources: &ResourceInfo) {
        if let Some(r) = &self.reporter {
            r.update_node_resources(resources);
        }
    }
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl From<SharedReporter> for MetricsHandle {
    fn from(reporter: SharedReporter) -> Self {
        Self::new(reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        messages: Mutex<Vec<(String, String)>>,
        connections: Mutex<Vec<usize>>,
    }

    impl MetricsReporter for Recording {
        fn record_message(&self, direction: &str, kind: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((direction.to_string(), kind.to_string()));
        }
        fn record_latency(&self, _: &str, _: &str, _: Duration) {}
        fn update_node_status(&self, _: NodeStatus) {}
        fn update_connection_count(&self, count: usize) {
            self.connections.lock().unwrap().push(count);
        }
        fn record_inference_request(&self, _: &str, _: &str, _: Duration, _: u32) {}
    }

    #[test]
    fn disabled_handle_is_noop() {
        let handle = MetricsHandle::disabled();
        assert!(!handle.is_enabled());
        handle.record_message(INCOMING, "join");
        handle.update_connection_count(3);
        handle.update_node_resources(&ResourceInfo::default());
    }

    #[test]
    fn enabled_handle_forwards() {
        let recording = Arc::new(Recording::default());
        let handle = MetricsHandle::new(recording.clone());

        handle.record_message(OUTGOING, "resource_broadcast");
        handle.update_connection_count(2);
        // Default trait method, accepted and ignored.
        handle.update_node_resources(&ResourceInfo::default());

        assert_eq!(
            recording.messages.lock().unwrap().as_slice(),
            &[("outgoing".to_string(), "resource_broadcast".to_string())]
        );
        assert_eq!(recording.connections.lock().unwrap().as_slice(), &[2]);
    }
}
