//! llmesh-metrics — operational metrics for cluster nodes.
//!
//! [`MetricsReporter`] is the narrow interface the membership layer, the
//! resource broadcaster, and the RPC services report through.
//! [`MetricsCollector`] is the in-process implementation, exposed in
//! Prometheus text format by [`render_prometheus`].

pub mod collector;
pub mod prometheus;
pub mod reporter;

pub use collector::{CollectorSnapshot, MetricsCollector, compute_percentiles};
pub use prometheus::render_prometheus;
pub use reporter::{INCOMING, MetricsHandle, MetricsReporter, OUTGOING, SharedReporter};
