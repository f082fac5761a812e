//! Quorum fan-out of one message to `2F+1` replicas.

use crate::client::{FunctionInvoker, ReplicaInvocation};
use crate::config::InvokerConfig;
use crate::error::InvokerResult;
use crate::message::InboundMessage;
use crate::stats::Stats;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome of one quorum dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Submissions accepted locally.
    pub submitted: usize,
    /// Submissions that failed locally and were dropped.
    pub failed: usize,
}

/// Builds the replica variants of a message and submits them concurrently.
#[derive(Clone)]
pub struct QuorumDispatcher {
    config: Arc<InvokerConfig>,
    stats: Arc<Stats>,
}

impl QuorumDispatcher {
    pub fn new(config: Arc<InvokerConfig>, stats: Arc<Stats>) -> Self {
        Self { config, stats }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// One invocation per replica, in `Uuids` order.
    pub fn replica_invocations(&self, mut message: InboundMessage) -> InvokerResult<Vec<ReplicaInvocation>> {
        self.config
            .uuids
            .iter()
            .take(self.config.quorum_size())
            .map(|replica_id| -> InvokerResult<ReplicaInvocation> {
                let payload = message.replica_payload(replica_id)?;
                Ok(ReplicaInvocation::event(
                    self.config.fcn_name.clone(),
                    replica_id.clone(),
                    payload,
                ))
            })
            .collect()
    }

    /// Fan `message` out to every replica through `client`.
    ///
    /// Returns once every submission has completed locally. Failed
    /// submissions are logged and counted, never retried.
    pub async fn dispatch(
        &self,
        message: InboundMessage,
        client: Arc<dyn FunctionInvoker>,
        msg_id: u64,
    ) -> InvokerResult<DispatchReport> {
        let invocations = self.replica_invocations(message)?;
        let mut submissions = JoinSet::new();

        for invocation in invocations {
            self.stats.record_invocation();
            let client = client.clone();
            submissions.spawn(async move {
                let replica_id = invocation.replica_id.clone();
                (replica_id, client.invoke(invocation).await)
            });
        }

        let mut report = DispatchReport::default();
        while let Some(joined) = submissions.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.submitted += 1,
                Ok((replica_id, Err(e))) => {
                    warn!(
                        msg_id,
                        replica = %replica_id,
                        endpoint = %client.endpoint(),
                        error = %e,
                        "Replica invocation failed"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(msg_id, error = %e, "Replica submission task aborted");
                    report.failed += 1;
                }
            }
        }

        debug!(
            msg_id,
            submitted = report.submitted,
            failed = report.failed,
            "Message dispatched"
        );

        Ok(report)
    }
}
