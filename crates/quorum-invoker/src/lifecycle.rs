//! Shutdown handling.
//!
//! Sentinel receipt, OS signals and threshold exhaustion all funnel into
//! [`LifecycleController::shutdown`], which emits the final stats exactly once.

use crate::error::InvokerResult;
use crate::stats::{Stats, StatsSnapshot};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;

/// Why the invoker is stopping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The `END` sentinel arrived on the inbound channel.
    Sentinel,
    /// An OS termination signal was caught.
    Signal(String),
    /// Threshold mode admitted its quota and drained it.
    ThresholdReached,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Sentinel => write!(f, "sentinel"),
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::ThresholdReached => write!(f, "threshold reached"),
        }
    }
}

/// Process lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Running = 0,
    ShuttingDown = 1,
    Terminated = 2,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Running,
            1 => LifecycleState::ShuttingDown,
            _ => LifecycleState::Terminated,
        }
    }
}

pub struct LifecycleController {
    state: AtomicU8,
    stats: Arc<Stats>,
}

impl LifecycleController {
    pub fn new(stats: Arc<Stats>) -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Running as u8),
            stats,
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move to `Terminated`, emitting final stats.
    ///
    /// Only the first caller gets the snapshot; later calls return `None`.
    pub fn shutdown(&self, reason: &ShutdownReason) -> Option<StatsSnapshot> {
        if self
            .state
            .compare_exchange(
                LifecycleState::Running as u8,
                LifecycleState::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return None;
        }

        info!(reason = %reason, "Shutting down");
        let snapshot = self.stats.snapshot();
        snapshot.emit();

        self.state.store(LifecycleState::Terminated as u8, Ordering::SeqCst);
        Some(snapshot)
    }
}

/// Wait for an OS termination signal and return its name.
#[cfg(unix)]
pub async fn wait_for_signal() -> InvokerResult<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    info!(signal = name, "Caught signal");
    Ok(name)
}

/// Wait for ctrl-c and return its name.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> InvokerResult<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!(signal = "ctrl-c", "Caught signal");
    Ok("ctrl-c")
}
