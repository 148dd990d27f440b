//! Newline-delimited JSON over TCP.
//!
//! One task per connection: lines read off the socket go into the hub's
//! queue, answers and broadcasts come back through the session's writer.
//! The core never sees the socket, only the `ClientSession` trait.

use std::sync::Arc;

use agora_core::core_hub::Hub;
use agora_core::core_protocol::{ClientSession, SessionError, SessionId};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// One connected TCP client.
struct TcpSession {
    id: SessionId,
    writer: Mutex<OwnedWriteHalf>,
}

#[async_trait]
impl ClientSession for TcpSession {
    fn id(&self) -> SessionId {
        self.id.clone()
    }

    async fn send(&self, mut payload: Vec<u8>) -> Result<(), SessionError> {
        payload.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&payload)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

/// Accept connections until the listener fails or the task is dropped.
pub async fn serve(hub: Arc<Hub>, listener: TcpListener) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "listening for clients");
    loop {
        let (stream, peer) = listener.accept().await?;
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(hub, stream).await {
                debug!(peer = %peer, "connection closed: {e}");
            }
        });
    }
}

async fn handle_connection(hub: Arc<Hub>, stream: TcpStream) -> anyhow::Result<()> {
    let peer = stream.peer_addr()?;
    let (read_half, write_half) = stream.into_split();
    let session = Arc::new(TcpSession {
        id: SessionId(Uuid::new_v4().to_string()),
        writer: Mutex::new(write_half),
    });
    info!(session = %session.id(), peer = %peer, "client connected");

    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if hub
            .dispatch(session.clone(), line.into_bytes())
            .await
            .is_err()
        {
            break;
        }
    }

    info!(session = %session.id(), "client disconnected");
    let _ = hub.on_session_closed(session.id()).await;
    Ok(())
}
