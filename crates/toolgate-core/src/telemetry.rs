use std::collections::BTreeMap;

/// Capability interface for span/metric recording. A no-op implementation is
/// selected at boot when metrics are disabled; a real backend (Prometheus,
/// OpenTelemetry) is wired in by the composition root otherwise. Components
/// never reach for a process-global recorder directly.
pub trait Recorder: Send + Sync {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn record_duration_ms(&self, name: &str, ms: f64, labels: &[(&str, &str)]);
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// Default recorder used whenever telemetry is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn record_duration_ms(&self, _name: &str, _ms: f64, _labels: &[(&str, &str)]) {}
    fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// Recorder that forwards to the process-wide `metrics` facade, which in
/// turn is exported by whatever exporter the binary installed (Prometheus,
/// by default, in `toolgate-server`).
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsRecorder;

impl Recorder for MetricsRecorder {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let labels = owned_labels(labels);
        metrics::counter!(name.to_string(), labels).increment(1);
    }

    fn record_duration_ms(&self, name: &str, ms: f64, labels: &[(&str, &str)]) {
        let labels = owned_labels(labels);
        metrics::histogram!(name.to_string(), labels).record(ms);
    }

    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let labels = owned_labels(labels);
        metrics::gauge!(name.to_string(), labels).set(value);
    }
}

fn owned_labels(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Lightweight timer that records elapsed time on drop; used to wrap a
/// suspension point without threading a `start` instant through call sites.
pub struct Timer<'a> {
    name: &'static str,
    labels: BTreeMap<&'static str, &'static str>,
    recorder: &'a dyn Recorder,
    start: std::time::Instant,
}

impl<'a> Timer<'a> {
    pub fn start(name: &'static str, recorder: &'a dyn Recorder) -> Self {
        Self {
            name,
            labels: BTreeMap::new(),
            recorder,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        let labels: Vec<(&str, &str)> = self.labels.iter().map(|(k, v)| (*k, *v)).collect();
        self.recorder.record_duration_ms(
            self.name,
            self.start.elapsed().as_secs_f64() * 1000.0,
            &labels,
        );
    }
}
