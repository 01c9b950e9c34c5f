//! In-process counters.
//!
//! A single [`Metrics`] handle is created at startup and passed to whoever
//! records into it; there is no process-wide state.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic operational counters.
#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    total_latency_ms: AtomicU64,
    llm_calls: AtomicU64,
    tool_calls: AtomicU64,
    tool_failures: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Requests served.
    pub request_count: u64,
    /// Mean request latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Model calls attempted.
    pub llm_calls: u64,
    /// Successful tool invocations.
    pub tool_calls: u64,
    /// Refused or failed tool invocations.
    pub tool_failures: u64,
}

impl Metrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one served request.
    pub fn record_request(&self, latency_ms: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record one model call.
    pub fn record_llm_call(&self) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one tool invocation.
    pub fn record_tool_call(&self, success: bool) {
        if success {
            self.tool_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tool_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy the current values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let request_count = self.requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let avg_latency_ms = if request_count == 0 {
            0.0
        } else {
            total_latency as f64 / request_count as f64
        };

        MetricsSnapshot {
            request_count,
            avg_latency_ms,
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
        }
    }
}
