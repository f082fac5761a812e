//! Quorum invoker: fans each inbound request out to `2F+1` remote function replicas.
//!
//! Requests arrive as JSON objects on a local Unix socket. Every request is
//! re-stamped once per replica identifier and submitted fire-and-forget to the
//! configured remote function, so that downstream agreement can tolerate up to
//! `F` faulty replicas.
//!
//! # Core Invariants
//!
//! 1. **Quorum fan-out**: every accepted request yields exactly `2F+1`
//!    submissions, differing only in the `"uuid"` field
//! 2. **Fire-and-forget**: remote results are never awaited or read
//! 3. **Best effort**: a failed submission is logged, never retried, and never
//!    aborts its siblings
//! 4. **One stats report**: sentinel, signal and threshold shutdown all emit
//!    final throughput exactly once
//!
//! # Architecture
//!
//! ```text
//! Unix socket -> IntakeLoop -> QuorumDispatcher -> FunctionInvoker (x 2F+1)
//!                    |               |
//!                    +---> Stats <---+
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod intake;
pub mod lifecycle;
pub mod message;
pub mod stats;

#[cfg(test)]
mod tests;

pub use channel::{IpcChannel, MessageSource};
pub use client::{FunctionInvoker, HttpFunctionInvoker, InvocationMode, ReplicaInvocation};
pub use config::{GatewayConfig, GatewayOverrides, InvokerConfig};
pub use dispatcher::{DispatchReport, QuorumDispatcher};
pub use error::{InvokerError, InvokerResult};
pub use intake::{AdmissionMode, IntakeLoop};
pub use lifecycle::{wait_for_signal, LifecycleController, LifecycleState, ShutdownReason};
pub use message::{Inbound, InboundMessage};
pub use stats::{Stats, StatsSnapshot};
