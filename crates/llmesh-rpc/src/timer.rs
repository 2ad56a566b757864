use std::time::Instant;

use llmesh_metrics::MetricsHandle;

/// Records `("grpc", method)` latency when dropped, so every exit path of a
/// handler is measured, including `?` returns.
pub(crate) struct CallTimer {
    metrics: MetricsHandle,
    method: &'static str,
    started: Instant,
}

impl CallTimer {
    pub(crate) fn start(metrics: &MetricsHandle, method: &'static str) -> Self {
        Self {
            metrics: metrics.clone(),
            method,
            started: Instant::now(),
        }
    }
}

impl Drop for CallTimer {
    fn drop(&mut self) {
        self.metrics
            .record_latency("grpc", self.method, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmesh_metrics::MetricsCollector;
    use std::sync::Arc;

    #[test]
    fn records_on_drop() {
        let collector = Arc::new(MetricsCollector::new("n"));
        let metrics = MetricsHandle::new(collector.clone());
        {
            let _timer = CallTimer::start(&metrics, "HealthCheck");
        }
        let snap = collector.snapshot();
        assert!(
            snap.latencies
                .iter()
                .any(|l| l.target == "grpc" && l.operation == "HealthCheck")
        );
    }
}
