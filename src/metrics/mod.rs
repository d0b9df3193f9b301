/*!
 * # Metrics Module
 *
 * Exposes operational metrics for the stockroom API in two formats:
 * - Prometheus text format at `/metrics`
 * - JSON format at `/metrics/json`
 *
 * Domain counters (mutations, conflicts, amendments) are registered with the
 * default prometheus registry by the services that own them. This module adds
 * a lightweight in-process registry for HTTP traffic metrics and merges both
 * into the text exposition.
 */

use axum::{extract::Request, middleware::Next, response::Response};
use dashmap::DashMap;
use lazy_static::lazy_static;
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

#[derive(Debug, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Gauge storing an f64 through its bit pattern so fractional values such as
/// latencies survive the atomic round-trip.
#[derive(Debug, Clone)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram reduced to running sum and count, which is all the exposition
/// formats here report.
#[derive(Debug, Clone)]
pub struct Histogram {
    sum_micros: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum_micros: Arc::new(AtomicU64::new(0)),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a value in seconds.
    pub fn observe(&self, value: f64) {
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges
            .entry(name.to_string())
            .or_insert_with(Gauge::new)
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    pub fn export_metrics(&self) -> String {
        let mut output = String::new();

        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, gauge.get()));
        }

        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            output.push_str(&format!("# TYPE {} histogram\n", name));
            output.push_str(&format!("{}_count {}\n", name, histogram.get_count()));
            output.push_str(&format!("{}_sum {}\n", name, histogram.get_sum()));
        }

        output
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let mut counters = serde_json::Map::new();
        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            counters.insert(name.to_string(), json!(counter.get()));
        }

        let mut gauges = serde_json::Map::new();
        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            gauges.insert(name.to_string(), json!(gauge.get()));
        }

        let mut histograms = serde_json::Map::new();
        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            histograms.insert(
                name.to_string(),
                json!({
                    "count": histogram.get_count(),
                    "sum": histogram.get_sum(),
                }),
            );
        }

        json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

// Global metrics registry
lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
    pub static ref APP_METRICS: AppMetrics = AppMetrics::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn increment_counter_by(name: &str, value: u64) {
    METRICS.get_or_create_counter(name).inc_by(value);
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

pub fn observe_histogram(name: &str, value: f64) {
    METRICS.get_or_create_histogram(name).observe(value);
}

/// HTTP traffic metrics recorded by the `track_requests` middleware.
pub struct AppMetrics {
    pub requests_total: Counter,
    pub requests_duration: Histogram,
    pub errors_total: Counter,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: METRICS.get_or_create_counter("http_requests_total"),
            requests_duration: METRICS.get_or_create_histogram("http_request_duration_seconds"),
            errors_total: METRICS.get_or_create_counter("http_errors_total"),
        }
    }

    pub fn record_request(&self, duration: std::time::Duration, server_error: bool) {
        self.requests_total.inc();
        self.requests_duration.observe(duration.as_secs_f64());
        if server_error {
            self.errors_total.inc();
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that counts every request and its latency.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    APP_METRICS.record_request(start.elapsed(), response.status().is_server_error());
    response
}

// HTTP endpoint handler for metrics
pub async fn metrics_handler() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    let mut output =
        String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))?;

    output.push_str(&METRICS.export_metrics());
    Ok(output)
}

pub async fn metrics_json_handler() -> Result<serde_json::Value, MetricsError> {
    Ok(METRICS.export_metrics_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let registry = MetricsRegistry::new();
        let counter = registry.get_or_create_counter("test_requests_total");
        counter.inc();
        counter.inc_by(4);
        assert_eq!(
            registry.get_or_create_counter("test_requests_total").get(),
            5
        );
    }

    #[test]
    fn gauges_keep_fractional_values() {
        let gauge = Gauge::new();
        gauge.set(2.5);
        assert_eq!(gauge.get(), 2.5);
        gauge.set(0.001);
        assert!((gauge.get() - 0.001).abs() < f64::EPSILON);
    }

    #[test]
    fn histograms_track_sum_and_count() {
        let histogram = Histogram::new();
        histogram.observe(0.25);
        histogram.observe(0.75);
        assert_eq!(histogram.get_count(), 2);
        assert!((histogram.get_sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn text_export_carries_type_lines() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("widgets_total").inc();
        registry.get_or_create_gauge("water_level").set(3.0);

        let text = registry.export_metrics();
        assert!(text.contains("# TYPE widgets_total counter"));
        assert!(text.contains("widgets_total 1"));
        assert!(text.contains("# TYPE water_level gauge"));
    }

    #[test]
    fn json_export_groups_by_metric_kind() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("issues_total").inc_by(7);
        registry.get_or_create_histogram("latency_seconds").observe(0.5);

        let value = registry.export_metrics_json();
        assert_eq!(value["counters"]["issues_total"], 7);
        assert_eq!(value["histograms"]["latency_seconds"]["count"], 1);
    }

    #[tokio::test]
    async fn exposition_merges_both_registries() {
        increment_counter("exposition_probe_total");
        let body = metrics_handler().await.expect("export should succeed");
        assert!(body.contains("exposition_probe_total"));
    }
}
