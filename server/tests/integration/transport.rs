// gore_server/server/tests/integration/transport.rs
mod common;

use bytes::Bytes;
use common::{build_world, map_with_npcs};
use gore_server_core::core::config::ServerConfig;
use gore_server_core::core::constants::MAX_DATAGRAM_SIZE;
use gore_server_core::core::time::ManualClock;
use gore_server_core::network::tcp::{encode_frame, ConnectionEvent, TcpTransport};
use gore_server_core::network::udp::{AddressedPacket, DatagramSource, UdpChannel};
use gore_server_core::{GameServer, ServerError};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;

/// A receiver whose socket has been torn away by the host.
struct RevokedSocket;

impl DatagramSource for RevokedSocket {
    fn poll_recv_from(&self, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<SocketAddr>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::PermissionDenied, "socket revoked")))
    }
}

async fn dead_udp_channel() -> UdpChannel {
    let socket = UdpSocket::bind(loopback()).await.unwrap();
    let channel = UdpChannel::with_receiver(socket, RevokedSocket, MAX_DATAGRAM_SIZE).unwrap();
    for _ in 0..200 {
        if channel.check_health().is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    channel
}

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

async fn wait_for_datagrams(channel: &UdpChannel, count: usize) -> Vec<AddressedPacket> {
    let mut got = Vec::new();
    for _ in 0..200 {
        got.extend(channel.get_recv_data());
        if got.len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    got
}

async fn wait_for_events(transport: &TcpTransport, count: usize) -> Vec<ConnectionEvent> {
    let mut got = Vec::new();
    for _ in 0..200 {
        got.extend(transport.get_events());
        if got.len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    got
}

#[tokio::test]
async fn udp_bind_reports_assigned_port_and_drain_is_exclusive() {
    let channel = UdpChannel::bind(loopback(), MAX_DATAGRAM_SIZE).await.unwrap();
    assert_ne!(channel.port(), 0);
    assert!(channel.get_recv_data().is_empty());

    let client = UdpSocket::bind(loopback()).await.unwrap();
    let server_addr = SocketAddr::from(([127, 0, 0, 1], channel.port()));
    client.send_to(b"first", server_addr).await.unwrap();
    client.send_to(b"second!", server_addr).await.unwrap();

    let got = wait_for_datagrams(&channel, 2).await;
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].data, Bytes::from_static(b"first"));
    assert_eq!(got[1].data, Bytes::from_static(b"second!"));
    assert_eq!(got[0].remote, client.local_addr().unwrap());
    assert!(channel.get_recv_data().is_empty());
    assert!(channel.check_health().is_ok());
}

#[tokio::test]
async fn udp_send_rejects_oversized_and_empty_payloads() {
    let channel = UdpChannel::bind(loopback(), MAX_DATAGRAM_SIZE).await.unwrap();
    let client = UdpSocket::bind(loopback()).await.unwrap();
    let to = client.local_addr().unwrap();

    let too_big = vec![7u8; MAX_DATAGRAM_SIZE + 1];
    assert!(matches!(
        channel.send(&too_big, to),
        Err(ServerError::PayloadTooLarge { len, max }) if len == MAX_DATAGRAM_SIZE + 1 && max == MAX_DATAGRAM_SIZE
    ));
    assert!(matches!(channel.send(&[], to), Err(ServerError::EmptyPayload)));

    let exact = vec![1u8; MAX_DATAGRAM_SIZE];
    channel.send(&exact, to).unwrap();
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE * 2];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("datagram arrives")
        .unwrap();
    assert_eq!(len, MAX_DATAGRAM_SIZE);
    assert_eq!(from.port(), channel.port());
}

#[tokio::test]
async fn oversized_incoming_datagrams_are_dropped() {
    let channel = UdpChannel::bind(loopback(), 16).await.unwrap();
    let client = UdpSocket::bind(loopback()).await.unwrap();
    let server_addr = SocketAddr::from(([127, 0, 0, 1], channel.port()));
    client.send_to(&[0u8; 64], server_addr).await.unwrap();
    client.send_to(b"ok", server_addr).await.unwrap();

    let got = wait_for_datagrams(&channel, 1).await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].data, Bytes::from_static(b"ok"));
}

#[tokio::test]
async fn tcp_frames_flow_both_ways() {
    let transport = TcpTransport::bind(loopback(), 512).await.unwrap();
    let mut client = TcpStream::connect(transport.local_addr()).await.unwrap();
    client.write_all(&encode_frame(b"ping").unwrap()).await.unwrap();

    let events = wait_for_events(&transport, 2).await;
    let (id, sender) = match &events[0] {
        ConnectionEvent::Connected { id, sender, .. } => (*id, sender.clone()),
        other => panic!("expected Connected, got {:?}", other),
    };
    match &events[1] {
        ConnectionEvent::Frame { id: frame_id, data } => {
            assert_eq!(*frame_id, id);
            assert_eq!(data, &Bytes::from_static(b"ping"));
        }
        other => panic!("expected Frame, got {:?}", other),
    }

    assert!(sender.send(Bytes::from_static(b"pong")));
    let mut reply = [0u8; 6];
    tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut reply))
        .await
        .expect("reply arrives")
        .unwrap();
    assert_eq!(&reply, &[0, 4, b'p', b'o', b'n', b'g']);

    drop(client);
    let events = wait_for_events(&transport, 1).await;
    assert!(matches!(events.as_slice(), [ConnectionEvent::Closed { id: closed, reason: None }] if *closed == id));
}

#[tokio::test]
async fn tcp_oversized_frame_closes_connection() {
    let transport = TcpTransport::bind(loopback(), 8).await.unwrap();
    let mut client = TcpStream::connect(transport.local_addr()).await.unwrap();
    client.write_all(&encode_frame(&[1u8; 9]).unwrap()).await.unwrap();

    let events = wait_for_events(&transport, 2).await;
    assert!(matches!(events[0], ConnectionEvent::Connected { .. }));
    assert!(matches!(&events[1], ConnectionEvent::Closed { reason: Some(_), .. }));
    assert!(transport.check_health().is_ok());
}

#[tokio::test]
async fn failed_receive_loop_is_fatal_for_the_channel() {
    let channel = dead_udp_channel().await;
    assert!(matches!(channel.check_health(), Err(ServerError::TransportFatal(_))));
    assert!(channel.get_recv_data().is_empty());
}

#[tokio::test]
async fn dead_udp_channel_stops_the_game_loop() {
    let (world, _) = build_world(vec![map_with_npcs(1, &[])]);
    let config = Arc::new(ServerConfig::default());
    let mut server = GameServer::with_parts(config, world, Arc::new(ManualClock::new(1000)));
    server.attach_udp(dead_udp_channel().await);

    assert!(matches!(server.tick(), Err(ServerError::TransportFatal(_))));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let result = tokio::time::timeout(Duration::from_secs(2), server.run_game_loop(shutdown_rx))
        .await
        .expect("game loop stops without a shutdown signal");
    assert!(matches!(result, Err(ServerError::TransportFatal(_))));
}
