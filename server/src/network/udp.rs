// gore_server/server/src/network/udp.rs
use crate::concurrent::receive_queue::ReceiveQueue;
use crate::core::constants::UDP_RECV_BUFFER_SIZE;
use crate::core::error::{ServerError, ServerResult};
use bytes::Bytes;
use parking_lot::Mutex;
use std::future::poll_fn;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::ReadBuf;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A received datagram and the endpoint it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedPacket {
    pub data: Bytes,
    pub remote: SocketAddr,
}

/// Where a channel's receive loop reads datagrams from.
pub trait DatagramSource: Send + Sync + 'static {
    fn poll_recv_from(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<SocketAddr>>;
}

impl DatagramSource for UdpSocket {
    fn poll_recv_from(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<SocketAddr>> {
        UdpSocket::poll_recv_from(self, cx, buf)
    }
}

/// One bound UDP socket with a self-perpetuating receive loop.
///
/// The receive task only enqueues; the simulation drains with
/// [`UdpChannel::get_recv_data`] once per tick. Dropping the channel aborts
/// the task and closes the socket.
pub struct UdpChannel {
    socket: Arc<UdpSocket>,
    queue: Arc<ReceiveQueue<AddressedPacket>>,
    failure: Arc<Mutex<Option<String>>>,
    max_datagram_size: usize,
    port: u16,
    recv_task: JoinHandle<()>,
}

impl UdpChannel {
    /// Binds the socket and starts receiving. Port 0 asks the OS for one;
    /// [`UdpChannel::port`] reports what was assigned.
    pub async fn bind(addr: SocketAddr, max_datagram_size: usize) -> ServerResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| ServerError::InitializationFailed(format!("UDP bind to {} failed: {}", addr, e)))?;
        let socket = Arc::new(socket);
        let channel = UdpChannel::start(socket.clone(), socket, max_datagram_size)?;
        info!("UDP channel bound on port {}", channel.port);
        Ok(channel)
    }

    /// Sends through `socket` but receives from `receiver`.
    pub fn with_receiver<S: DatagramSource>(socket: UdpSocket, receiver: S, max_datagram_size: usize) -> ServerResult<Self> {
        UdpChannel::start(Arc::new(socket), Arc::new(receiver), max_datagram_size)
    }

    fn start<S: DatagramSource>(socket: Arc<UdpSocket>, receiver: Arc<S>, max_datagram_size: usize) -> ServerResult<Self> {
        let port = socket.local_addr()?.port();
        let queue = Arc::new(ReceiveQueue::new());
        let failure = Arc::new(Mutex::new(None));

        let recv_task = tokio::spawn(receive_loop(receiver, queue.clone(), failure.clone(), max_datagram_size));
        Ok(UdpChannel { socket, queue, failure, max_datagram_size, port, recv_task })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Everything received since the last call. Empty when nothing arrived.
    pub fn get_recv_data(&self) -> Vec<AddressedPacket> {
        self.queue.drain()
    }

    /// Sends one datagram without waiting. Oversized and empty payloads are
    /// rejected; a full socket buffer drops the datagram.
    pub fn send(&self, data: &[u8], to: SocketAddr) -> ServerResult<()> {
        if data.is_empty() {
            return Err(ServerError::EmptyPayload);
        }
        if data.len() > self.max_datagram_size {
            return Err(ServerError::PayloadTooLarge { len: data.len(), max: self.max_datagram_size });
        }
        match self.socket.try_send_to(data, to) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                metrics::counter!("net_udp_send_dropped_total").increment(1);
                debug!("UDP send buffer full, dropped {} bytes to {}", data.len(), to);
                Ok(())
            }
            Err(e) => Err(ServerError::NetworkError(format!("UDP send to {} failed: {}", to, e))),
        }
    }

    /// `Err` once the receive loop has died; the channel cannot recover.
    pub fn check_health(&self) -> ServerResult<()> {
        match &*self.failure.lock() {
            Some(reason) => Err(ServerError::TransportFatal(format!("UDP port {}: {}", self.port, reason))),
            None => Ok(()),
        }
    }
}

impl Drop for UdpChannel {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused | ErrorKind::Interrupted | ErrorKind::WouldBlock
    )
}

async fn receive_loop<S: DatagramSource>(
    source: Arc<S>,
    queue: Arc<ReceiveQueue<AddressedPacket>>,
    failure: Arc<Mutex<Option<String>>>,
    max_datagram_size: usize,
) {
    let mut buffer = vec![0u8; UDP_RECV_BUFFER_SIZE.max(max_datagram_size + 1)];
    loop {
        let received = poll_fn(|cx| {
            let mut buf = ReadBuf::new(&mut buffer);
            source.poll_recv_from(cx, &mut buf).map_ok(|remote| (buf.filled().len(), remote))
        })
        .await;
        match received {
            Ok((len, remote)) => {
                if len == 0 {
                    continue;
                }
                if len > max_datagram_size {
                    metrics::counter!("net_packets_dropped_total", "reason" => "oversize").increment(1);
                    warn!("Dropping {} byte datagram from {} (max {})", len, remote, max_datagram_size);
                    continue;
                }
                queue.push(AddressedPacket { data: Bytes::copy_from_slice(&buffer[..len]), remote });
            }
            Err(e) if is_transient(e.kind()) => {
                debug!("Transient UDP receive error: {}", e);
            }
            Err(e) => {
                error!("UDP receive loop stopped: {}", e);
                *failure.lock() = Some(e.to_string());
                return;
            }
        }
    }
}
