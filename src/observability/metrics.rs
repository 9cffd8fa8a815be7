//! Thread-safe metrics collection
//!
//! Atomic counters for high-frequency events and mutex-protected maps for
//! per-route and per-stage statistics. A single global collector is exposed
//! through [`metrics()`] and served by the `/metrics` endpoint.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of duration samples kept per series
const MAX_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Where a stage ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTarget {
    Remote,
    Local,
}

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    requests_received: AtomicU64,
    requests_in_flight: AtomicU64,
    requests_completed: AtomicU64,
    requests_failed: AtomicU64,
    request_times: Mutex<Vec<u64>>,

    route_counts: Mutex<HashMap<String, u64>>,
    stage_stats: Mutex<HashMap<String, StageStats>>,

    discovery_runs: AtomicU64,
    endpoints_probed: AtomicU64,
    registry_size: AtomicU64,
    last_discovery: AtomicU64,

    uptime_start: AtomicU64,
}

#[derive(Debug, Default)]
struct StageStats {
    remote: u64,
    local: u64,
    errors: u64,
    durations: Vec<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            requests_in_flight: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            request_times: Mutex::new(Vec::new()),
            route_counts: Mutex::new(HashMap::new()),
            stage_stats: Mutex::new(HashMap::new()),
            discovery_runs: AtomicU64::new(0),
            endpoints_probed: AtomicU64::new(0),
            registry_size: AtomicU64::new(0),
            last_discovery: AtomicU64::new(0),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        self.requests_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_completed(&self, duration: Duration) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
        self.finish_request(duration);
    }

    pub fn request_failed(&self, duration: Duration) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.finish_request(duration);
    }

    fn finish_request(&self, duration: Duration) {
        // Saturating: a reset between received and finished must not wrap
        let _ = self
            .requests_in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        if let Ok(mut times) = self.request_times.lock() {
            push_sample(&mut times, duration);
        }
    }

    pub fn route_selected(&self, label: &str) {
        if let Ok(mut counts) = self.route_counts.lock() {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }
    }

    pub fn stage_executed(
        &self,
        stage: &str,
        target: StageTarget,
        duration: Duration,
        failed: bool,
    ) {
        if let Ok(mut stats) = self.stage_stats.lock() {
            let entry = stats.entry(stage.to_string()).or_default();
            match target {
                StageTarget::Remote => entry.remote += 1,
                StageTarget::Local => entry.local += 1,
            }
            if failed {
                entry.errors += 1;
            }
            push_sample(&mut entry.durations, duration);
        }
    }

    /// Record one discovery run over `attempted` endpoints yielding `found` descriptors
    pub fn record_discovery(&self, attempted: usize, found: usize) {
        self.discovery_runs.fetch_add(1, Ordering::Relaxed);
        self.endpoints_probed
            .fetch_add(attempted as u64, Ordering::Relaxed);
        self.registry_size.store(found as u64, Ordering::Relaxed);
        self.last_discovery
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.requests_received,
            &self.requests_in_flight,
            &self.requests_completed,
            &self.requests_failed,
            &self.discovery_runs,
            &self.endpoints_probed,
            &self.registry_size,
            &self.last_discovery,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);
        if let Ok(mut times) = self.request_times.lock() {
            times.clear();
        }
        if let Ok(mut counts) = self.route_counts.lock() {
            counts.clear();
        }
        if let Ok(mut stats) = self.stage_stats.lock() {
            stats.clear();
        }
    }

    fn request_statistics(&self) -> (f64, f64, f64) {
        let Ok(times) = self.request_times.lock() else {
            return (0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let mut sorted = times.clone();
        sorted.sort_unstable();
        (
            average(&sorted),
            percentile(&sorted, 50.0),
            percentile(&sorted, 95.0),
        )
    }

    fn stage_snapshots(&self) -> BTreeMap<String, StageMetrics> {
        let Ok(stats) = self.stage_stats.lock() else {
            return BTreeMap::new();
        };
        stats
            .iter()
            .map(|(name, s)| {
                (
                    name.clone(),
                    StageMetrics {
                        remote_calls: s.remote,
                        local_runs: s.local,
                        errors: s.errors,
                        avg_duration_ms: average(&s.durations),
                    },
                )
            })
            .collect()
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_duration_ms, p50, p95) = self.request_statistics();
        let routes = self
            .route_counts
            .lock()
            .map(|counts| counts.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();

        MetricsSnapshot {
            requests: RequestMetrics {
                received: self.requests_received.load(Ordering::Relaxed),
                in_flight: self.requests_in_flight.load(Ordering::Relaxed),
                completed: self.requests_completed.load(Ordering::Relaxed),
                failed: self.requests_failed.load(Ordering::Relaxed),
                avg_duration_ms,
                duration_p50_ms: p50,
                duration_p95_ms: p95,
            },
            routes,
            stages: self.stage_snapshots(),
            discovery: DiscoveryMetrics {
                runs: self.discovery_runs.load(Ordering::Relaxed),
                endpoints_probed: self.endpoints_probed.load(Ordering::Relaxed),
                registry_size: self.registry_size.load(Ordering::Relaxed),
                last_run: self.last_discovery.load(Ordering::Relaxed),
            },
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestMetrics,
    pub routes: BTreeMap<String, u64>,
    pub stages: BTreeMap<String, StageMetrics>,
    pub discovery: DiscoveryMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct RequestMetrics {
    pub received: u64,
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
    pub avg_duration_ms: f64,
    pub duration_p50_ms: f64,
    pub duration_p95_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct StageMetrics {
    pub remote_calls: u64,
    pub local_runs: u64,
    pub errors: u64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryMetrics {
    pub runs: u64,
    pub endpoints_probed: u64,
    pub registry_size: u64,
    pub last_run: u64,
}

fn push_sample(samples: &mut Vec<u64>, duration: Duration) {
    samples.push(duration.as_millis() as u64);
    if samples.len() > MAX_SAMPLES {
        samples.remove(0);
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn average(data: &[u64]) -> f64 {
    if data.is_empty() {
        0.0
    } else {
        data.iter().sum::<u64>() as f64 / data.len() as f64
    }
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_request_metrics() {
        let collector = MetricsCollector::new();

        collector.request_received();
        collector.request_received();
        collector.request_completed(Duration::from_millis(1500));

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.requests.received, 2);
        assert_eq!(snapshot.requests.completed, 1);
        assert_eq!(snapshot.requests.in_flight, 1);
        assert!(snapshot.requests.avg_duration_ms > 1400.0);
    }

    #[test]
    fn test_route_and_stage_metrics() {
        let collector = MetricsCollector::new();

        collector.route_selected("risk_only");
        collector.route_selected("risk_only");
        collector.route_selected("full_pipeline");
        collector.stage_executed(
            "risk_assessment",
            StageTarget::Remote,
            Duration::from_millis(200),
            false,
        );
        collector.stage_executed(
            "risk_assessment",
            StageTarget::Local,
            Duration::from_millis(2),
            true,
        );

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.routes["risk_only"], 2);
        assert_eq!(snapshot.routes["full_pipeline"], 1);
        let risk = &snapshot.stages["risk_assessment"];
        assert_eq!(risk.remote_calls, 1);
        assert_eq!(risk.local_runs, 1);
        assert_eq!(risk.errors, 1);
    }

    #[test]
    fn test_discovery_metrics() {
        let collector = MetricsCollector::new();
        collector.record_discovery(3, 2);
        collector.record_discovery(3, 1);

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.discovery.runs, 2);
        assert_eq!(snapshot.discovery.endpoints_probed, 6);
        assert_eq!(snapshot.discovery.registry_size, 1);
        assert!(snapshot.discovery.last_run > 0);
    }

    #[test]
    fn test_thread_safety() {
        let collector = Arc::new(MetricsCollector::new());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for _ in 0..100 {
                        collector.request_received();
                        collector.route_selected("document_only");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.requests.received, 1000);
        assert_eq!(snapshot.routes["document_only"], 1000);
    }

    #[test]
    fn test_percentile_calculation() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        assert!((percentile(&data, 50.0) - 5.5).abs() < 0.1);
        assert!((percentile(&data, 95.0) - 9.55).abs() < 0.1);
        assert!((percentile(&data, 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((percentile(&data, 100.0) - 10.0).abs() < f64::EPSILON);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();
        collector.request_received();
        collector.route_selected("risk_only");
        collector.record_discovery(2, 2);

        collector.reset();

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.requests.received, 0);
        assert!(snapshot.routes.is_empty());
        assert_eq!(snapshot.discovery.registry_size, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        collector.route_selected("compliance_only");

        let json = serde_json::to_value(collector.get_metrics()).unwrap();
        assert_eq!(json["routes"]["compliance_only"], 1);
        assert!(json["requests"]["received"].is_u64());
    }
}
