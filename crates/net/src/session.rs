// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One TCP connection framed as CRLF-terminated lines.
//!
//! A session runs a reader task (socket → line channel) and a sender task
//! (send queue → socket). Both observe the session's shutdown token; any
//! read or write error closes the session so the watchdog can drive a
//! reconnect. Within one session, lines are sent in the order they were
//! enqueued.

use std::time::Duration;

use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("dial {host}:{port} failed: {source}")]
    Dial {
        host: String,
        port: u16,
        source: std::io::Error,
    },
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read chunk size. One monitoring burst from a gateway fits comfortably;
/// anything longer just takes extra reads.
const READ_CHUNK: usize = 1024;

enum SendItem {
    Line(String),
    /// Sentinel used by the watchdog to wake a blocked sender.
    Poke,
}

/// Handle to a live line-framed connection.
pub struct LineSession {
    label: String,
    send_tx: mpsc::UnboundedSender<SendItem>,
    shutdown: CancellationToken,
}

impl LineSession {
    /// Dial a TCP endpoint. Kept separate from [`LineSession::start`] so
    /// callers can run a login handshake on the raw stream first.
    pub async fn dial(host: &str, port: u16) -> Result<TcpStream, SessionError> {
        TcpStream::connect((host, port))
            .await
            .map_err(|source| SessionError::Dial {
                host: host.to_string(),
                port,
                source,
            })
    }

    /// Dial and start in one step.
    pub async fn connect(
        label: &str,
        host: &str,
        port: u16,
        post_send_pause: Option<Duration>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<String>, Vec<JoinHandle<()>>), SessionError>
    {
        let stream = Self::dial(host, port).await?;
        Ok(Self::start(label, stream, post_send_pause))
    }

    /// Start reader and sender tasks over an established stream.
    ///
    /// Returns the session handle, the receive side of `lines()`, and the
    /// worker task handles for watchdog registration. `post_send_pause`, when
    /// set, inserts a gap after every transmitted line (some panels cannot
    /// absorb back-to-back commands).
    pub fn start(
        label: &str,
        stream: TcpStream,
        post_send_pause: Option<Duration>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<String>, Vec<JoinHandle<()>>) {
        let (read_half, write_half) = stream.into_split();
        let (send_tx, send_rx) = mpsc::unbounded_channel();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let session = Arc::new(Self {
            label: label.to_string(),
            send_tx,
            shutdown: shutdown.clone(),
        });

        let reader = tokio::spawn(read_loop(
            label.to_string(),
            read_half,
            line_tx,
            shutdown.clone(),
        ));
        let sender = tokio::spawn(send_loop(
            label.to_string(),
            write_half,
            send_rx,
            post_send_pause,
            shutdown,
        ));

        (session, line_rx, vec![reader, sender])
    }

    /// Enqueue a line for asynchronous transmission; returns immediately.
    /// Enqueued lines are discarded if the session closes first.
    pub fn send(&self, line: impl Into<String>) {
        let line = line.into();
        if self.send_tx.send(SendItem::Line(line)).is_err() {
            debug!(session = %self.label, "send on closed session dropped");
        }
    }

    /// Wake the sender task without transmitting anything.
    pub fn poke(&self) {
        let _ = self.send_tx.send(SendItem::Poke);
    }

    /// Close the session. Idempotent; terminates both worker tasks and
    /// causes `lines()` to end.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once the session has closed (locally or by socket error).
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Split complete CRLF-terminated lines out of `buffer`, leaving the trailing
/// partial line in place.
fn split_crlf(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == b'\r' && buffer[i + 1] == b'\n' {
            lines.push(String::from_utf8_lossy(&buffer[start..i]).into_owned());
            start = i + 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    buffer.drain(..start);
    lines
}

async fn read_loop(
    label: String,
    mut read_half: OwnedReadHalf,
    line_tx: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
) {
    let mut leftovers: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = read_half.read(&mut chunk) => match result {
                Ok(0) => {
                    debug!(session = %label, "peer closed socket");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(session = %label, error = %e, "read failed");
                    break;
                }
            },
        };
        leftovers.extend_from_slice(&chunk[..n]);
        for line in split_crlf(&mut leftovers) {
            if line_tx.send(line).is_err() {
                // Receiver gone; nothing left to feed.
                break;
            }
        }
    }
    // Reader exit closes the whole session so the watchdog notices.
    shutdown.cancel();
}

async fn send_loop(
    label: String,
    mut write_half: OwnedWriteHalf,
    mut send_rx: mpsc::UnboundedReceiver<SendItem>,
    post_send_pause: Option<Duration>,
    shutdown: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = shutdown.cancelled() => break,
            item = send_rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        let line = match item {
            SendItem::Line(line) => line,
            SendItem::Poke => continue,
        };
        debug!(session = %label, %line, "send");
        let mut frame = line.into_bytes();
        frame.extend_from_slice(b"\r\n");
        if let Err(e) = write_half.write_all(&frame).await {
            warn!(session = %label, error = %e, "write failed");
            break;
        }
        if let Some(pause) = post_send_pause {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
    shutdown.cancel();
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
