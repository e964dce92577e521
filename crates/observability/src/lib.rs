use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    pipeline_failures_total: AtomicU64,
    generator_calls_total: AtomicU64,
    routes_scored_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub pipeline_failures_total: u64,
    pub generator_calls_total: u64,
    pub routes_scored_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pipeline_failure(&self) {
        self.pipeline_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_generator_call(&self) {
        self.generator_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_routes_scored(&self, routes: usize) {
        self.routes_scored_total
            .fetch_add(routes as u64, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            pipeline_failures_total: self.pipeline_failures_total.load(Ordering::Relaxed),
            generator_calls_total: self.generator_calls_total.load(Ordering::Relaxed),
            routes_scored_total: self.routes_scored_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

/// JSON logs on stdout, for the server.
pub fn init_tracing(service_name: &str) {
    init_tracing_with_writer(service_name, std::io::stdout);
}

/// JSON logs on an explicit sink. Command-line tools pass `std::io::stderr` so
/// stdout carries only their output.
pub fn init_tracing_with_writer<W>(service_name: &str, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,loopwalk_api=info,loopwalk_agents=info,loopwalk_providers=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_per_request() {
        let metrics = AppMetrics::default();
        assert_eq!(metrics.snapshot().avg_latency_millis, 0.0);

        metrics.inc_request();
        metrics.inc_request();
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));
        metrics.add_routes_scored(3);
        metrics.inc_generator_call();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.routes_scored_total, 3);
        assert_eq!(snapshot.generator_calls_total, 1);
        assert_eq!(snapshot.avg_latency_millis, 20.0);
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn logs_go_to_the_given_writer() {
        let sink = SharedBuffer::default();
        let make_writer = {
            let sink = sink.clone();
            move || sink.clone()
        };
        init_tracing_with_writer("loopwalk_observability", make_writer);

        tracing::info!(route_id = 3, "writer check");

        let written = String::from_utf8(sink.0.lock().clone()).unwrap();
        let line = written
            .lines()
            .find(|line| line.contains("writer check"))
            .expect("event should be written to the sink");
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["fields"]["route_id"], 3);
    }
}
