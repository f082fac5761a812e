//! Process-wide throughput counters.
//!
//! All mutation is a single atomic increment, so dispatch tasks share one
//! `Arc<Stats>` without a lock. Throughput is computed once, at shutdown.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Shared invocation counters.
#[derive(Debug, Default)]
pub struct Stats {
    invoke_count: AtomicU64,
    received: AtomicU64,
    start_time: OnceLock<Instant>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor the workload window. Only the first call has any effect.
    pub fn mark_started(&self) {
        let _ = self.start_time.set(Instant::now());
    }

    /// Count one accepted inbound message.
    pub fn record_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one replica invocation submission.
    pub fn record_invocation(&self) -> u64 {
        self.invoke_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn invoke_count(&self) -> u64 {
        self.invoke_count.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    /// Time since the first accepted message, zero if none arrived yet.
    pub fn elapsed(&self) -> Duration {
        self.start_time.get().map(Instant::elapsed).unwrap_or_default()
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::new(self.invoke_count(), self.received(), self.elapsed())
    }
}

/// Final counters plus derived throughput.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub invoke_count: u64,
    pub received: u64,
    pub elapsed_secs: f64,
    pub throughput: f64,
}

impl StatsSnapshot {
    pub fn new(invoke_count: u64, received: u64, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if invoke_count == 0 || elapsed_secs <= 0.0 {
            0.0
        } else {
            invoke_count as f64 / elapsed_secs
        };

        Self {
            invoke_count,
            received,
            elapsed_secs,
            throughput,
        }
    }

    /// Write the summary to the log.
    pub fn emit(&self) {
        info!(
            invoke_count = self.invoke_count,
            received = self.received,
            elapsed_secs = self.elapsed_secs,
            throughput = self.throughput,
            "Final invoker stats"
        );
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Invoke count: {}", self.invoke_count)?;
        writeln!(f, "Received from replica: {}", self.received)?;
        writeln!(f, "Ran for: {:.6}", self.elapsed_secs)?;
        write!(
            f,
            "Throughput (invocations per second): {:.6} invocations/sec",
            self.throughput
        )
    }
}
