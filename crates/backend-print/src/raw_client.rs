// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP device transport (JetDirect-style, default port 9100).
//
// The simplest possible device transport: open a TCP socket and write
// bytes. No settings, no job tracking beyond the byte offset — the run
// loop supplies the flow control and error-recovery policy (§4.3).

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use backend_core::error::{BackendError, Result};

/// Default raw TCP port (HP JetDirect / AppSocket).
pub const RAW_PORT: u16 = 9100;

/// Timeout for establishing the TCP connection.
const CONNECT_TIMEOUT_SECS: u64 = 60;

/// A connected device socket, reusable across the run loop's write attempts
/// so a single connection serves the whole job.
pub struct DeviceSocket {
    stream: TcpStream,
    addr: String,
}

impl DeviceSocket {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        info!(addr = %addr, "connecting to device");
        let stream = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| {
            BackendError::RunLoop(format!(
                "connection to {addr} timed out after {CONNECT_TIMEOUT_SECS}s"
            ))
        })?
        .map_err(|e| BackendError::RunLoop(format!("connect to {addr}: {e}")))?;

        Ok(DeviceSocket { stream, addr })
    }

    /// Write one chunk, returning the number of bytes accepted. The run
    /// loop drives this in a `tokio::select!` alongside the side-channel
    /// and SNMP poll, so a single call must never block indefinitely.
    ///
    /// Returns the raw `io::Error` (not wrapped in a formatted
    /// [`BackendError`]) so callers can classify it with
    /// [`crate::runloop::classify_error`] the same way the generic run loop
    /// does (§4.3 step 8) instead of treating every write failure as fatal.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<usize> {
        self.stream.write(chunk).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.stream
            .flush()
            .await
            .map_err(|e| BackendError::RunLoop(format!("flush to {}: {}", self.addr, e)))
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| BackendError::RunLoop(format!("shutdown of {}: {}", self.addr, e)))
    }
}

/// Send a whole document in one shot, starting from `offset` (used to
/// resume after a partial send). Intended for the non-interactive path;
/// the run loop uses [`DeviceSocket::write_chunk`] directly when it needs
/// to interleave side-channel polling between writes.
pub async fn send_raw_with_offset(
    host: &str,
    port: u16,
    document_bytes: &[u8],
    offset: usize,
) -> Result<()> {
    let mut socket = DeviceSocket::connect(host, port).await?;

    let remaining = &document_bytes[offset..];
    const CHUNK_SIZE: usize = 8192;

    let mut sent = offset;
    for chunk in remaining.chunks(CHUNK_SIZE) {
        let mut written = 0;
        while written < chunk.len() {
            written += socket.write_chunk(&chunk[written..]).await?;
        }
        sent += chunk.len();
        debug!(sent, total = document_bytes.len(), "raw TCP progress");
    }

    socket.flush().await?;
    socket.shutdown().await?;
    info!(total = document_bytes.len(), "raw TCP job sent");
    Ok(())
}
