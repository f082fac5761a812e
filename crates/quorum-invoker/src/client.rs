//! Remote invocation client.
//!
//! Submits one replica payload to a named remote function without waiting
//! for, or reading, the function's result. Only local submission failures are
//! reported.

use crate::error::{InvokerError, InvokerResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Header carrying the invocation mode.
pub const INVOCATION_TYPE_HEADER: &str = "X-Amz-Invocation-Type";

/// How the remote side should run an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Queue the invocation and return immediately.
    Event,
}

impl InvocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationMode::Event => "Event",
        }
    }
}

/// One per-replica invocation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaInvocation {
    /// Target function name.
    pub function: String,
    /// Replica identifier stamped into the payload.
    pub replica_id: String,
    /// Serialized JSON payload.
    pub payload: Vec<u8>,
    pub mode: InvocationMode,
}

impl ReplicaInvocation {
    pub fn event(function: impl Into<String>, replica_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            function: function.into(),
            replica_id: replica_id.into(),
            payload,
            mode: InvocationMode::Event,
        }
    }
}

/// Capability to trigger a named remote function.
///
/// Implementations are shared read-only across every dispatch task.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Endpoint this client submits to, for logging.
    fn endpoint(&self) -> &str;

    /// Submit one invocation. `Ok` means the submission was accepted locally.
    async fn invoke(&self, invocation: ReplicaInvocation) -> InvokerResult<()>;
}

/// HTTP client for one invocation endpoint.
#[derive(Debug, Clone)]
pub struct HttpFunctionInvoker {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpFunctionInvoker {
    /// Build a session for `endpoint`, authenticating with `auth_token` if given.
    pub fn new(
        endpoint: impl Into<String>,
        auth_token: Option<&str>,
        request_timeout: Duration,
    ) -> InvokerResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| InvokerError::Config(format!("invalid auth token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL that invokes `function` on this endpoint.
    pub fn invocation_url(&self, function: &str) -> String {
        format!("{}/2015-03-31/functions/{}/invocations", self.endpoint, function)
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionInvoker {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn invoke(&self, invocation: ReplicaInvocation) -> InvokerResult<()> {
        let response = self
            .http_client
            .post(self.invocation_url(&invocation.function))
            .header(INVOCATION_TYPE_HEADER, invocation.mode.as_str())
            .body(invocation.payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvokerError::Submission {
                function: invocation.function,
                status: status.as_u16(),
            });
        }

        debug!(
            function = %invocation.function,
            replica = %invocation.replica_id,
            status = status.as_u16(),
            "Invocation submitted"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP request, replying with `status_line`, and return the raw request.
    async fn serve_once(listener: TcpListener, status_line: &'static str) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
        stream.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&raw).to_string()
    }

    #[test]
    fn test_invocation_url() {
        let client =
            HttpFunctionInvoker::new("https://lambda.us-west-1.amazonaws.com/", None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            client.invocation_url("verify"),
            "https://lambda.us-west-1.amazonaws.com/2015-03-31/functions/verify/invocations"
        );
        assert_eq!(client.endpoint(), "https://lambda.us-west-1.amazonaws.com");
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let result = HttpFunctionInvoker::new("http://localhost", Some("bad\ntoken"), Duration::from_secs(1));
        assert!(matches!(result, Err(InvokerError::Config(_))));
    }

    #[tokio::test]
    async fn test_submits_event_invocation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "202 Accepted"));

        let client =
            HttpFunctionInvoker::new(format!("http://{}", addr), Some("secret"), Duration::from_secs(5)).unwrap();
        let invocation = ReplicaInvocation::event("verify", "a", br#"{"uuid":"a","x":1}"#.to_vec());
        client.invoke(invocation).await.unwrap();

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /2015-03-31/functions/verify/invocations"));
        assert!(lower.contains("x-amz-invocation-type: event"));
        assert!(lower.contains("authorization: bearer secret"));
        assert!(request.ends_with(r#"{"uuid":"a","x":1}"#));
    }

    #[tokio::test]
    async fn test_rejected_submission_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "500 Internal Server Error"));

        let client = HttpFunctionInvoker::new(format!("http://{}", addr), None, Duration::from_secs(5)).unwrap();
        let result = client
            .invoke(ReplicaInvocation::event("verify", "b", b"{}".to_vec()))
            .await;

        assert!(matches!(
            result,
            Err(InvokerError::Submission { status: 500, ref function }) if function == "verify"
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpFunctionInvoker::new(format!("http://{}", addr), None, Duration::from_secs(2)).unwrap();
        let result = client
            .invoke(ReplicaInvocation::event("verify", "c", b"{}".to_vec()))
            .await;
        assert!(matches!(result, Err(InvokerError::Http(_))));
    }
}
