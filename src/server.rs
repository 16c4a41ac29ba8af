//! JSON-lines tool-call surface.
//!
//! One request object per line in, one response object per line out.
//! Requests on a stream are handled concurrently, so responses may come
//! back out of order; an optional `id` is echoed to match them up.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::inspector::{Inspector, ToolRequest, ToolResponse};
use crate::ports::SshConnector;

#[derive(Debug, Deserialize)]
struct WireRequest {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    request: ToolRequest,
}

#[derive(Debug, Serialize)]
struct WireResponse {
    id: Option<Value>,
    #[serde(flatten)]
    response: ToolResponse,
}

/// Serve one stream until the reader hits EOF.
///
/// Waits for every in-flight request to be answered before returning.
///
/// # Errors
///
/// Returns an error if reading from the stream fails.
pub async fn serve_lines<C, R, W>(
    inspector: Arc<Inspector<C>>,
    reader: R,
    writer: W,
    max_concurrent: usize,
) -> std::io::Result<()>
where
    C: SshConnector,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WireResponse>(100);
    let limit = Arc::new(Semaphore::new(max_concurrent.max(1)));

    // Single writer so lines never interleave
    let writer_handle = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_string(&response) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "Failed to serialize response");
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!(error = %e, "Failed to write response");
                break;
            }
            if let Err(e) = writer.flush().await {
                error!(error = %e, "Failed to flush response");
                break;
            }
        }
    });

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(request = %trimmed, "Received request");

        let wire = match serde_json::from_str::<WireRequest>(trimmed) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "Malformed request line");
                let response = WireResponse {
                    id: None,
                    response: ToolResponse::error(format!("malformed request: {e}")),
                };
                let _ = tx.send(response).await;
                continue;
            }
        };

        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            error!("Request limiter closed unexpectedly");
            break;
        };

        let inspector = Arc::clone(&inspector);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = inspector.handle(&wire.request).await;
            let _ = tx
                .send(WireResponse {
                    id: wire.id,
                    response,
                })
                .await;
            drop(permit);
        });
    }

    // Workers hold their own senders; the writer drains until the last one finishes
    drop(tx);
    let _ = writer_handle.await;
    Ok(())
}

/// Accept TCP clients forever, serving each on its own task.
///
/// # Errors
///
/// Returns an error if accepting a connection fails.
pub async fn serve_tcp<C: SshConnector>(
    inspector: Arc<Inspector<C>>,
    listener: TcpListener,
    max_concurrent: usize,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Listening for tool calls");
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(peer = %peer, "Client connected");

        let inspector = Arc::clone(&inspector);
        tokio::spawn(async move {
            let (read_half, write_half) = stream.into_split();
            let reader = tokio::io::BufReader::new(read_half);
            match serve_lines(inspector, reader, write_half, max_concurrent).await {
                Ok(()) => info!(peer = %peer, "Client disconnected"),
                Err(e) => warn!(peer = %peer, error = %e, "Client stream failed"),
            }
        });
    }
}
