use std::sync::OnceLock;

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload. Safe to call more than once; the
/// recorder is installed on the first call only.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("Metrics recorder already installed; scrape output will be empty");
            }

            // Pre-register counters so they appear even before the first increment.
            counter!("predictions_created_total").absolute(0);
            counter!("predictions_judged_total").absolute(0);
            counter!("predictions_withdrawn_total").absolute(0);
            counter!("responses_created_total").absolute(0);
            counter!("access_denied_total").absolute(0);
            counter!("fragments_expired_total").absolute(0);

            handle
        })
        .clone()
}
