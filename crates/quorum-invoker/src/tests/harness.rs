//! Test harness for quorum invoker integration tests.
//!
//! Provides:
//! - RecordingInvoker: a FunctionInvoker that records every submission
//! - ScriptedSource: an in-memory MessageSource fed from a queue
//! - quorum_config: builds a valid InvokerConfig for a given F

use crate::channel::MessageSource;
use crate::client::{FunctionInvoker, ReplicaInvocation};
use crate::config::InvokerConfig;
use crate::error::{InvokerError, InvokerResult};
use crate::stats::Stats;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a RecordingInvoker answers submissions.
#[derive(Debug, Clone)]
pub enum InvokeBehavior {
    /// Accept every submission.
    Accept,
    /// Reject submissions for these replica ids.
    RejectReplicas(HashSet<String>),
    /// Reject every submission.
    RejectAll,
    /// Accept after a delay.
    Delay(Duration),
}

/// FunctionInvoker that records submissions instead of sending them.
pub struct RecordingInvoker {
    endpoint: String,
    behavior: InvokeBehavior,
    submitted: Mutex<Vec<ReplicaInvocation>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingInvoker {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Self::with_behavior(endpoint, InvokeBehavior::Accept)
    }

    pub fn with_behavior(endpoint: &str, behavior: InvokeBehavior) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.to_string(),
            behavior,
            submitted: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Every invocation seen, accepted or not.
    pub fn submitted(&self) -> Vec<ReplicaInvocation> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Payloads parsed back into JSON.
    pub fn payloads(&self) -> Vec<Value> {
        self.submitted()
            .iter()
            .map(|i| serde_json::from_slice(&i.payload).unwrap())
            .collect()
    }

    /// Highest number of submissions observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FunctionInvoker for RecordingInvoker {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn invoke(&self, invocation: ReplicaInvocation) -> InvokerResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(invocation.clone());

        let result = match &self.behavior {
            InvokeBehavior::Accept => Ok(()),
            InvokeBehavior::RejectReplicas(rejected) if rejected.contains(&invocation.replica_id) => {
                Err(InvokerError::Submission {
                    function: invocation.function.clone(),
                    status: 429,
                })
            }
            InvokeBehavior::RejectReplicas(_) => Ok(()),
            InvokeBehavior::RejectAll => Err(InvokerError::Submission {
                function: invocation.function.clone(),
                status: 503,
            }),
            InvokeBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// In-memory message source. An empty queue behaves like a receive timeout.
#[derive(Clone)]
pub struct ScriptedSource {
    queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, message: impl Into<Vec<u8>>) {
        self.queue.lock().unwrap().push_back(message.into());
    }

    pub fn push_json(&self, value: &Value) {
        self.push(serde_json::to_vec(value).unwrap());
    }

    pub fn push_sentinel(&self) {
        self.push(b"END".to_vec());
    }

    /// Messages still waiting to be read.
    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Messages handed out so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn recv(&mut self) -> InvokerResult<Option<Vec<u8>>> {
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(message) => {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(Some(message))
            }
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(None)
            }
        }
    }
}

/// Valid config with `2F+1` fresh replica ids.
pub fn quorum_config(f: usize) -> InvokerConfig {
    InvokerConfig {
        f,
        uuids: (0..2 * f + 1).map(|_| uuid::Uuid::new_v4().to_string()).collect(),
        fcn_name: "verify".to_string(),
        threshold_on: false,
        threshold: 0,
    }
}

/// Config with fixed replica ids.
pub fn named_config(f: usize, uuids: &[&str]) -> InvokerConfig {
    InvokerConfig {
        f,
        uuids: uuids.iter().map(|s| s.to_string()).collect(),
        fcn_name: "verify".to_string(),
        threshold_on: false,
        threshold: 0,
    }
}

/// Poll until `stats.invoke_count()` reaches `expected` or the timeout passes.
pub async fn wait_for_invocations(stats: &Stats, expected: u64, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if stats.invoke_count() >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stats.invoke_count() >= expected
}

/// Poll until `invoker` recorded `expected` submissions or the timeout passes.
pub async fn wait_for_submissions(invoker: &RecordingInvoker, expected: usize, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if invoker.submitted_count() >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    invoker.submitted_count() >= expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_source_order_and_timeout() {
        let mut source = ScriptedSource::new();
        source.push_json(&json!({"n": 1}));
        source.push_sentinel();

        assert_eq!(source.recv().await.unwrap(), Some(br#"{"n":1}"#.to_vec()));
        assert_eq!(source.recv().await.unwrap(), Some(b"END".to_vec()));
        assert_eq!(source.recv().await.unwrap(), None);
        assert_eq!(source.reads(), 2);
        assert_eq!(source.remaining(), 0);
    }

    #[tokio::test]
    async fn test_recording_invoker_rejects_selected_replicas() {
        let rejected: HashSet<String> = ["b".to_string()].into_iter().collect();
        let invoker = RecordingInvoker::with_behavior("mock", InvokeBehavior::RejectReplicas(rejected));

        assert!(invoker.invoke(ReplicaInvocation::event("verify", "a", b"{}".to_vec())).await.is_ok());
        assert!(invoker.invoke(ReplicaInvocation::event("verify", "b", b"{}".to_vec())).await.is_err());
        assert_eq!(invoker.submitted_count(), 2);
    }

    #[test]
    fn test_quorum_config_is_valid() {
        for f in 0..4 {
            assert!(quorum_config(f).validate().is_ok());
        }
    }
}
