//! Prometheus text exposition format.
//!
//! Renders a collector snapshot for scraping by a Prometheus server or
//! compatible agent. Every series carries a `node` label.

use std::fmt::Write;

use crate::collector::CollectorSnapshot;

/// Render a collector snapshot into Prometheus text format.
pub fn render_prometheus(s: &CollectorSnapshot) -> String {
    let mut out = String::new();
    let node = escape_label(&s.node_id);

    gauge(&mut out, "llmesh_node_status", "Node status (0=offline, 1=online, 2=busy).");
    let _ = writeln!(out, "llmesh_node_status{{node=\"{node}\"}} {}", s.node_status.gauge_value());

    gauge(&mut out, "llmesh_uptime_seconds", "Seconds since the collector started.");
    let _ = writeln!(out, "llmesh_uptime_seconds{{node=\"{node}\"}} {}", s.uptime_secs);

    gauge(&mut out, "llmesh_network_connections", "Number of known peers.");
    let _ = writeln!(out, "llmesh_network_connections{{node=\"{node}\"}} {}", s.connections);

    gauge(&mut out, "llmesh_cpu_cores", "CPU cores advertised by this node.");
    let _ = writeln!(out, "llmesh_cpu_cores{{node=\"{node}\"}} {}", s.cpu_cores);

    gauge(&mut out, "llmesh_memory_mb", "Total memory (RAM + VRAM) in megabytes.");
    let _ = writeln!(out, "llmesh_memory_mb{{node=\"{node}\"}} {}", s.memory_mb);

    gauge(&mut out, "llmesh_gpu_count", "Number of GPUs advertised by this node.");
    let _ = writeln!(out, "llmesh_gpu_count{{node=\"{node}\"}} {}", s.gpu_count);

    gauge(&mut out, "llmesh_layers_max", "Layer capacity of this node.");
    let _ = writeln!(out, "llmesh_layers_max{{node=\"{node}\"}} {}", s.max_layers);

    gauge(&mut out, "llmesh_layers_used", "Layers currently assigned to this node.");
    let _ = writeln!(out, "llmesh_layers_used{{node=\"{node}\"}} {}", s.used_layers);

    out.push_str("# HELP llmesh_network_messages_total Network messages by direction and kind.\n");
    out.push_str("# TYPE llmesh_network_messages_total counter\n");
    for m in &s.messages {
        let _ = writeln!(
            out,
            "llmesh_network_messages_total{{node=\"{node}\",direction=\"{}\",kind=\"{}\"}} {}",
            escape_label(&m.direction),
            escape_label(&m.kind),
            m.count
        );
    }

    gauge(&mut out, "llmesh_network_latency_p50_ms", "P50 operation latency in milliseconds.");
    for l in &s.latencies {
        let _ = writeln!(
            out,
            "llmesh_network_latency_p50_ms{{node=\"{node}\",target=\"{}\",operation=\"{}\"}} {:.2}",
            escape_label(&l.target),
            escape_label(&l.operation),
            l.p50_ms
        );
    }

    gauge(&mut out, "llmesh_network_latency_p99_ms", "P99 operation latency in milliseconds.");
    for l in &s.latencies {
        let _ = writeln!(
            out,
            "llmesh_network_latency_p99_ms{{node=\"{node}\",target=\"{}\",operation=\"{}\"}} {:.2}",
            escape_label(&l.target),
            escape_label(&l.operation),
            l.p99_ms
        );
    }

    out.push_str("# HELP llmesh_inference_requests_total Inference requests by model and status.\n");
    out.push_str("# TYPE llmesh_inference_requests_total counter\n");
    for i in &s.inference {
        let _ = writeln!(
            out,
            "llmesh_inference_requests_total{{node=\"{node}\",model=\"{}\",status=\"{}\"}} {}",
            escape_label(&i.model_id),
            escape_label(&i.status),
            i.requests
        );
    }

    out.push_str("# HELP llmesh_inference_tokens_total Tokens generated by model.\n");
    out.push_str("# TYPE llmesh_inference_tokens_total counter\n");
    for i in &s.inference {
        let _ = writeln!(
            out,
            "llmesh_inference_tokens_total{{node=\"{node}\",model=\"{}\",status=\"{}\"}} {}",
            escape_label(&i.model_id),
            escape_label(&i.status),
            i.tokens
        );
    }

    gauge(&mut out, "llmesh_inference_duration_avg_ms", "Mean inference duration in milliseconds.");
    for i in &s.inference {
        let _ = writeln!(
            out,
            "llmesh_inference_duration_avg_ms{{node=\"{node}\",model=\"{}\",status=\"{}\"}} {:.2}",
            escape_label(&i.model_id),
            escape_label(&i.status),
            i.avg_duration_ms
        );
    }

    out
}

fn gauge(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
