// gore_server/server/src/network/tcp.rs
use super::connection::ConnectionSender;
use crate::concurrent::receive_queue::ReceiveQueue;
use crate::core::constants::TCP_FRAME_HEADER_LEN;
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::ConnectionId;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What the reliable transport reports to the simulation.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { id: ConnectionId, remote: SocketAddr, sender: ConnectionSender },
    Frame { id: ConnectionId, data: Bytes },
    Closed { id: ConnectionId, reason: Option<String> },
}

/// Prefixes `payload` with its big-endian `u16` length.
pub fn encode_frame(payload: &[u8]) -> ServerResult<Bytes> {
    let len = u16::try_from(payload.len())
        .map_err(|_| ServerError::PayloadTooLarge { len: payload.len(), max: u16::MAX as usize })?;
    let mut buf = BytesMut::with_capacity(TCP_FRAME_HEADER_LEN + payload.len());
    buf.put_u16(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Length-prefixed TCP listener. Each accepted socket gets a reader task
/// feeding the shared event queue and a writer task draining its sender.
pub struct TcpTransport {
    local_addr: SocketAddr,
    events: Arc<ReceiveQueue<ConnectionEvent>>,
    failure: Arc<Mutex<Option<String>>>,
    accept_task: JoinHandle<()>,
}

impl TcpTransport {
    pub async fn bind(addr: SocketAddr, max_frame_size: usize) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::InitializationFailed(format!("TCP bind to {} failed: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;
        let events = Arc::new(ReceiveQueue::new());
        let failure = Arc::new(Mutex::new(None));

        let accept_task = tokio::spawn(accept_loop(listener, events.clone(), failure.clone(), max_frame_size));
        info!("TCP transport listening on {}", local_addr);
        Ok(TcpTransport { local_addr, events, failure, accept_task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn get_events(&self) -> Vec<ConnectionEvent> {
        self.events.drain()
    }

    pub fn check_health(&self) -> ServerResult<()> {
        match &*self.failure.lock() {
            Some(reason) => Err(ServerError::TransportFatal(format!("TCP {}: {}", self.local_addr, reason))),
            None => Ok(()),
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    events: Arc<ReceiveQueue<ConnectionEvent>>,
    failure: Arc<Mutex<Option<String>>>,
    max_frame_size: usize,
) {
    let next_id = AtomicU64::new(1);
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let id = ConnectionId(next_id.fetch_add(1, Ordering::Relaxed));
                spawn_connection(stream, id, remote, events.clone(), max_frame_size);
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::ConnectionAborted | std::io::ErrorKind::Interrupted) => {
                debug!("Transient accept error: {}", e);
            }
            Err(e) => {
                error!("TCP accept loop stopped: {}", e);
                *failure.lock() = Some(e.to_string());
                return;
            }
        }
    }
}

fn spawn_connection(
    stream: TcpStream,
    id: ConnectionId,
    remote: SocketAddr,
    events: Arc<ReceiveQueue<ConnectionEvent>>,
    max_frame_size: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", remote, e);
    }
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    events.push(ConnectionEvent::Connected { id, remote, sender: ConnectionSender::new(tx) });
    debug!("Accepted connection {} from {}", id, remote);

    tokio::spawn(write_loop(write_half, rx, id));
    tokio::spawn(async move {
        let reason = read_loop(read_half, id, &events, max_frame_size).await;
        events.push(ConnectionEvent::Closed { id, reason });
    });
}

/// Returns `None` on a clean close, otherwise why the connection was cut.
async fn read_loop(
    mut reader: OwnedReadHalf,
    id: ConnectionId,
    events: &ReceiveQueue<ConnectionEvent>,
    max_frame_size: usize,
) -> Option<String> {
    let mut header = [0u8; TCP_FRAME_HEADER_LEN];
    loop {
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return None,
            Err(e) => return Some(e.to_string()),
        }
        let len = u16::from_be_bytes(header) as usize;
        if len == 0 || len > max_frame_size {
            warn!("Connection {} sent a frame of {} bytes (max {}), closing", id, len, max_frame_size);
            metrics::counter!("net_packets_dropped_total", "reason" => "bad_frame").increment(1);
            return Some(format!("invalid frame length {}", len));
        }
        let mut payload = vec![0u8; len];
        if let Err(e) = reader.read_exact(&mut payload).await {
            return Some(e.to_string());
        }
        events.push(ConnectionEvent::Frame { id, data: Bytes::from(payload) });
    }
}

/// Runs until every sender for this connection is dropped.
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Bytes>, id: ConnectionId) {
    while let Some(payload) = rx.recv().await {
        let frame = match encode_frame(&payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Connection {}: {}", id, e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(&frame).await {
            debug!("Connection {} write failed: {}", id, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_has_big_endian_length_prefix() {
        let frame = encode_frame(b"abc").unwrap();
        assert_eq!(&frame[..], &[0, 3, b'a', b'b', b'c']);
        assert!(encode_frame(&vec![0u8; 70_000]).is_err());
    }
}
