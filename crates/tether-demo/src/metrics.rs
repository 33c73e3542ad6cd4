//! Prometheus export for the demo.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install a Prometheus recorder and describe the event metrics.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tether_core::metrics::describe();
    info!("Metrics initialized");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tether_core::metrics::names;
    use tether_core::{EventCenter, Observations, PropertyWatcher, SourceFilter};

    fn gauge_value(rendered: &str, name: &str) -> f64 {
        rendered
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(' '))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0.0)
    }

    #[test]
    fn test_gauges_settle_when_owners_die_first() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let target = Observations::new();
            let watcher = PropertyWatcher::new(&target, "score", || {});

            let center = EventCenter::new();
            let token = center.subscribe_scoped("goal", SourceFilter::Any, |_| {});

            let rendered = handle.render();
            assert_eq!(gauge_value(&rendered, names::OBSERVERS_ACTIVE), 1.0);
            assert_eq!(gauge_value(&rendered, names::LISTENERS_ACTIVE), 1.0);

            drop(target);
            drop(center);
            drop(watcher);
            drop(token);
        });

        let rendered = handle.render();
        assert_eq!(gauge_value(&rendered, names::OBSERVERS_ACTIVE), 0.0);
        assert_eq!(gauge_value(&rendered, names::LISTENERS_ACTIVE), 0.0);
    }
}
