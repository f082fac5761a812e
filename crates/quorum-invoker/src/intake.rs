//! Admission control over the inbound channel.
//!
//! The intake loop is the only reader of the channel. Each accepted request
//! is handed to the [`QuorumDispatcher`] as its own task; the loop never
//! waits for a dispatch before reading the next message.

use crate::channel::MessageSource;
use crate::client::FunctionInvoker;
use crate::config::InvokerConfig;
use crate::dispatcher::QuorumDispatcher;
use crate::error::{InvokerError, InvokerResult};
use crate::lifecycle::ShutdownReason;
use crate::message::{Inbound, InboundMessage};
use crate::stats::Stats;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, trace, warn};

/// Admission policy, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionMode {
    /// Dispatch every message as it arrives.
    Unbounded,
    /// Admit this many messages, drain them, then stop.
    Threshold(u64),
}

impl AdmissionMode {
    pub fn from_config(config: &InvokerConfig) -> Self {
        if config.threshold_on {
            AdmissionMode::Threshold(config.threshold)
        } else {
            AdmissionMode::Unbounded
        }
    }
}

/// Round-robin client index for a message sequence number.
pub fn select_client(sequence: u64, client_count: usize) -> usize {
    (sequence % client_count as u64) as usize
}

pub struct IntakeLoop<S> {
    source: S,
    dispatcher: QuorumDispatcher,
    clients: Vec<Arc<dyn FunctionInvoker>>,
    stats: Arc<Stats>,
    mode: AdmissionMode,
}

impl<S: MessageSource> IntakeLoop<S> {
    pub fn new(
        source: S,
        dispatcher: QuorumDispatcher,
        clients: Vec<Arc<dyn FunctionInvoker>>,
        stats: Arc<Stats>,
    ) -> InvokerResult<Self> {
        if clients.is_empty() {
            return Err(InvokerError::Config(
                "at least one invocation client is required".to_string(),
            ));
        }

        let mode = AdmissionMode::from_config(dispatcher.config());
        Ok(Self {
            source,
            dispatcher,
            clients,
            stats,
            mode,
        })
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    /// Run until a shutdown trigger. Malformed input is returned as an error.
    pub async fn run(&mut self) -> InvokerResult<ShutdownReason> {
        match self.mode {
            AdmissionMode::Unbounded => self.run_unbounded().await,
            AdmissionMode::Threshold(threshold) => self.run_threshold(threshold).await,
        }
    }

    async fn run_unbounded(&mut self) -> InvokerResult<ShutdownReason> {
        info!(clients = self.clients.len(), "Intake running in unbounded mode");

        loop {
            let Some(message) = self.next_request().await? else {
                return Ok(ShutdownReason::Sentinel);
            };

            let (msg_id, client) = self.admit();
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatcher.dispatch(message, client, msg_id).await {
                    error!(msg_id, error = %e, "Dispatch failed");
                }
            });
        }
    }

    async fn run_threshold(&mut self, threshold: u64) -> InvokerResult<ShutdownReason> {
        info!(threshold, "Thresholding is ON");

        let mut in_flight = JoinSet::new();
        let mut admitted = 0u64;

        while admitted < threshold {
            let Some(message) = self.next_request().await? else {
                // Dropping the JoinSet abandons whatever is still in flight.
                return Ok(ShutdownReason::Sentinel);
            };

            let (msg_id, client) = self.admit();
            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(async move { dispatcher.dispatch(message, client, msg_id).await });
            admitted += 1;
        }

        info!(admitted, "Threshold reached, intake closed; draining in-flight dispatches");

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e),
                Err(e) => warn!(error = %e, "Dispatch task aborted"),
            }
        }

        Ok(ShutdownReason::ThresholdReached)
    }

    /// Read until a request arrives. `None` means the sentinel was received.
    async fn next_request(&mut self) -> InvokerResult<Option<InboundMessage>> {
        loop {
            let Some(bytes) = self.source.recv().await? else {
                trace!("Receive timed out, polling again");
                continue;
            };

            match Inbound::parse(&bytes)? {
                Inbound::Sentinel => {
                    info!("RECEIVED: END from replica process. shutting down");
                    return Ok(None);
                }
                Inbound::Request(message) => return Ok(Some(message)),
            }
        }
    }

    /// Count an accepted message and pick its client.
    fn admit(&self) -> (u64, Arc<dyn FunctionInvoker>) {
        self.stats.mark_started();
        let msg_id = self.stats.record_received() - 1;
        let client = self.clients[select_client(msg_id, self.clients.len())].clone();
        (msg_id, client)
    }
}
