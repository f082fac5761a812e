//! Configuration for the quorum invoker.
//!
//! Two layers: [`InvokerConfig`] carries the quorum parameters and is read
//! from a JSON file, [`GatewayConfig`] carries process wiring (socket, timeouts,
//! endpoints) and is filled from defaults, environment and CLI overrides.

use crate::error::{InvokerError, InvokerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the inbound channel socket.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/invoker.sock";

/// Default inbound receive timeout in milliseconds.
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 100;

/// Default region when none is configured.
pub const DEFAULT_REGION: &str = "us-west-1";

/// Quorum parameters, loaded once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Maximum number of faulty replicas tolerated.
    #[serde(rename = "F")]
    pub f: usize,

    /// Replica identifiers, exactly `2F+1` of them, in dispatch order.
    #[serde(rename = "Uuids")]
    pub uuids: Vec<String>,

    /// Name of the remote function every replica invocation targets.
    #[serde(rename = "FcnName")]
    pub fcn_name: String,

    /// Whether threshold (admission control) mode is enabled.
    #[serde(rename = "ThresholdOn", default)]
    pub threshold_on: bool,

    /// Maximum number of admitted messages in threshold mode.
    #[serde(rename = "Threshold", default)]
    pub threshold: u64,
}

impl InvokerConfig {
    /// Parse and validate a config from a JSON string.
    pub fn from_json_str(json: &str) -> InvokerResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| InvokerError::Config(format!("invalid invoker config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> InvokerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InvokerError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Number of replicas each message fans out to.
    ///
    /// Saturates for an `F` that [`validate`](Self::validate) would reject.
    pub fn quorum_size(&self) -> usize {
        self.checked_quorum_size().unwrap_or(usize::MAX)
    }

    fn checked_quorum_size(&self) -> Option<usize> {
        self.f.checked_mul(2).and_then(|n| n.checked_add(1))
    }

    /// Check the quorum invariants.
    pub fn validate(&self) -> InvokerResult<()> {
        let Some(quorum_size) = self.checked_quorum_size() else {
            return Err(InvokerError::Config(format!("F too large: {}", self.f)));
        };

        if self.uuids.len() != quorum_size {
            return Err(InvokerError::Config(format!(
                "expected {} uuids for f = {}, got {}",
                quorum_size,
                self.f,
                self.uuids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.uuids.len());
        for uuid in &self.uuids {
            if !seen.insert(uuid.as_str()) {
                return Err(InvokerError::Config(format!("duplicate replica uuid: {}", uuid)));
            }
        }

        if self.fcn_name.trim().is_empty() {
            return Err(InvokerError::Config("FcnName must not be empty".to_string()));
        }

        if self.threshold_on && self.threshold == 0 {
            return Err(InvokerError::Config(
                "Threshold must be positive when ThresholdOn is set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Process wiring for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Path of the inbound Unix socket.
    pub socket_path: PathBuf,

    /// How long one receive waits before retrying.
    pub recv_timeout: Duration,

    /// Invocation endpoints, one client is built per entry.
    pub endpoints: Vec<String>,

    /// Optional bearer token sent with every invocation.
    pub auth_token: Option<String>,

    /// Upper bound on a single local submission.
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Create a GatewayConfig from defaults and environment variables.
    pub fn from_env() -> Self {
        let socket_path = std::env::var("INVOKER_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET_PATH));

        let recv_timeout_ms: u64 = std::env::var("INVOKER_RECV_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RECV_TIMEOUT_MS);

        let auth_token = std::env::var("INVOKER_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        Self {
            socket_path,
            recv_timeout: Duration::from_millis(recv_timeout_ms),
            endpoints: vec![region_endpoint(DEFAULT_REGION)],
            auth_token,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Replace the endpoint list with one endpoint per region.
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints: Vec<String> = regions.into_iter().map(|r| region_endpoint(r.as_ref())).collect();
        if !endpoints.is_empty() {
            self.endpoints = endpoints;
        }
        self
    }

    /// Apply command-line overrides on top of the env-derived config.
    ///
    /// Explicit endpoints win over regions; any CLI value wins over env.
    pub fn with_overrides(mut self, overrides: GatewayOverrides) -> InvokerResult<Self> {
        self = self.with_regions(&overrides.regions);

        if !overrides.endpoints.is_empty() {
            self.endpoints = overrides.endpoints;
        }
        if let Some(socket) = overrides.socket_path {
            self.socket_path = socket;
        }
        if let Some(ms) = overrides.recv_timeout_ms {
            self.recv_timeout = Duration::from_millis(ms);
        }
        if let Some(token) = overrides.auth_token {
            self.auth_token = Some(token);
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the wiring is usable.
    pub fn validate(&self) -> InvokerResult<()> {
        if self.endpoints.is_empty() {
            return Err(InvokerError::Config("at least one endpoint is required".to_string()));
        }
        if self.recv_timeout.is_zero() {
            return Err(InvokerError::Config("receive timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Command-line values that take precedence over [`GatewayConfig::from_env`].
#[derive(Debug, Clone, Default)]
pub struct GatewayOverrides {
    pub socket_path: Option<PathBuf>,
    pub recv_timeout_ms: Option<u64>,
    pub regions: Vec<String>,
    pub endpoints: Vec<String>,
    pub auth_token: Option<String>,
}

/// Invocation endpoint for a region.
pub fn region_endpoint(region: &str) -> String {
    format!("https://lambda.{}.amazonaws.com", region)
}
