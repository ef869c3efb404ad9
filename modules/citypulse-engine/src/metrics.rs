//! In-process request metrics: totals, cache hit rate, and a bounded
//! latency ring for average and P95.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

const LATENCY_RING_CAPACITY: usize = 1024;

#[derive(Default)]
pub struct SearchMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    provider_calls: AtomicU64,
    provider_failures: AtomicU64,
    model_calls: AtomicU64,
    empty_responses: AtomicU64,
    latencies_ms: Mutex<VecDeque<u64>>,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, latency_ms: u64, cache_hit: bool, empty: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if empty {
            self.empty_responses.fetch_add(1, Ordering::Relaxed);
        }
        let mut ring = self.latencies_ms.lock().expect("latency lock");
        if ring.len() == LATENCY_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(latency_ms);
    }

    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_call(&self) {
        self.model_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ring = self.latencies_ms.lock().expect("latency lock");
        let mut sorted: Vec<u64> = ring.iter().copied().collect();
        sorted.sort_unstable();
        let avg = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };
        let p95 = if sorted.is_empty() {
            0
        } else {
            let index = ((sorted.len() as f64) * 0.95).ceil() as usize - 1;
            sorted[index.min(sorted.len() - 1)]
        };

        let requests = self.requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: requests,
            cache_hits,
            cache_hit_rate: if requests == 0 {
                0.0
            } else {
                cache_hits as f64 / requests as f64
            },
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            model_calls: self.model_calls.load(Ordering::Relaxed),
            empty_responses: self.empty_responses.load(Ordering::Relaxed),
            avg_latency_ms: avg,
            p95_latency_ms: p95,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub provider_calls: u64,
    pub provider_failures: u64,
    pub model_calls: u64,
    pub empty_responses: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: u64,
}
