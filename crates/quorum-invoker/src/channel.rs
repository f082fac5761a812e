//! Inbound channel: a single-peer Unix socket carrying length-prefixed frames.
//!
//! Wire format, little-endian:
//! ```text
//! [4: payload_len][N: payload]
//! ```
//!
//! One peer is served at a time. When it disconnects the channel goes back
//! to accepting, so a restarted producer can reconnect to the same path.

use crate::error::{InvokerError, InvokerResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Length prefix size in bytes.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Largest payload accepted in one frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Source of raw inbound messages.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` when the receive timeout elapsed with nothing to
    /// deliver; callers simply try again.
    async fn recv(&mut self) -> InvokerResult<Option<Vec<u8>>>;
}

/// Encode a payload as one frame (including length prefix).
///
/// Payloads over [`MAX_FRAME_LEN`] are rejected, matching [`read_frame`].
pub fn encode_frame(payload: &[u8]) -> InvokerResult<Vec<u8>> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(InvokerError::Protocol(format!(
            "payload of {} bytes exceeds limit of {}",
            payload.len(),
            MAX_FRAME_LEN
        )));
    }

    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Read a length-prefixed frame from a buffer.
///
/// Returns `Ok(None)` if there isn't enough data for a complete frame, or
/// `Ok(Some((payload, consumed)))` with the payload and the total bytes consumed.
pub fn read_frame(buf: &[u8]) -> InvokerResult<Option<(&[u8], usize)>> {
    if buf.len() < LEN_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    prefix.copy_from_slice(&buf[..LEN_PREFIX_SIZE]);
    let len = u32::from_le_bytes(prefix) as usize;

    if len > MAX_FRAME_LEN {
        return Err(InvokerError::Protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            len, MAX_FRAME_LEN
        )));
    }

    if buf.len() < LEN_PREFIX_SIZE + len {
        return Ok(None);
    }

    Ok(Some((&buf[LEN_PREFIX_SIZE..LEN_PREFIX_SIZE + len], LEN_PREFIX_SIZE + len)))
}

/// Listening end of the inbound channel.
pub struct IpcChannel {
    listener: UnixListener,
    socket_path: PathBuf,
    peer: Option<UnixStream>,
    read_buf: Vec<u8>,
    recv_timeout: Duration,
}

impl IpcChannel {
    /// Bind the channel at `socket_path`, replacing a stale socket file.
    pub fn bind(socket_path: &Path, recv_timeout: Duration) -> InvokerResult<Self> {
        let bind_err = |source: std::io::Error| InvokerError::Bind {
            path: socket_path.display().to_string(),
            source,
        };

        match std::fs::remove_file(socket_path) {
            Ok(()) => debug!(path = %socket_path.display(), "Removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(bind_err(e)),
        }

        let listener = UnixListener::bind(socket_path).map_err(bind_err)?;

        info!(
            path = %socket_path.display(),
            recv_timeout_ms = recv_timeout.as_millis() as u64,
            "Inbound channel listening"
        );

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            peer: None,
            read_buf: Vec::with_capacity(4096),
            recv_timeout,
        })
    }

    /// Wait without limit for the next complete frame.
    ///
    /// Cancel-safe: a partially read frame stays buffered.
    async fn next_frame(&mut self) -> InvokerResult<Vec<u8>> {
        loop {
            if let Some((payload, consumed)) = read_frame(&self.read_buf)? {
                let message = payload.to_vec();
                self.read_buf.drain(..consumed);
                return Ok(message);
            }

            let Some(peer) = self.peer.as_mut() else {
                let (stream, _) = self.listener.accept().await?;
                info!("Producer connected to inbound channel");
                self.read_buf.clear();
                self.peer = Some(stream);
                continue;
            };

            let mut chunk = [0u8; 4096];
            let read = peer.read(&mut chunk).await;
            match read {
                Ok(0) => {
                    if !self.read_buf.is_empty() {
                        warn!(
                            buffered = self.read_buf.len(),
                            "Producer disconnected mid-frame, discarding partial data"
                        );
                    }
                    info!("Producer disconnected from inbound channel");
                    self.peer = None;
                    self.read_buf.clear();
                }
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "Inbound read failed, dropping producer");
                    self.peer = None;
                    self.read_buf.clear();
                }
            }
        }
    }
}

#[async_trait]
impl MessageSource for IpcChannel {
    async fn recv(&mut self) -> InvokerResult<Option<Vec<u8>>> {
        match timeout(self.recv_timeout, self.next_frame()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for IpcChannel {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
