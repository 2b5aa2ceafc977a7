//! End-to-end tunnel tests over loopback TCP
//!
//! Each test starts an echo backend and a relay on ephemeral ports, issues
//! tokens with the relay's secret and salt, and drives real client sockets
//! through the relay.

use std::net::SocketAddr;
use std::time::Duration;

use futures::future::join_all;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tunnelgate_core::DestinationAddress;
use tunnelgate_crypto::TokenCodec;
use tunnelgate_daemon::{ServerStats, TunnelServer};
use tunnelgate_settings::Settings;

const SECRET: &[u8] = b"an-example-very-secret-key-32byt";
const SALT: &[u8] = b"v1";

// =============================================================================
// HELPERS
// =============================================================================

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

fn codec() -> TokenCodec {
    TokenCodec::from_bytes(SECRET, SALT).unwrap()
}

/// Echo server: every byte received is written back
async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}

async fn start_relay(settings: Settings) -> (SocketAddr, ServerStats) {
    let server = TunnelServer::from_settings(&settings, codec()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let stats = server.stats();
    tokio::spawn(server.run());
    (addr, stats)
}

fn local_settings() -> Settings {
    Settings {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..Settings::default()
    }
}

fn token_for(backend: SocketAddr) -> String {
    codec().encode(&DestinationAddress::parse(&backend.to_string()).unwrap())
}

async fn open_tunnel(relay: SocketAddr, token: &str) -> TcpStream {
    let mut client = TcpStream::connect(relay).await.unwrap();
    client.write_all(token.as_bytes()).await.unwrap();
    client.write_all(b"\n").await.unwrap();
    client
}

async fn echo(client: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    client.write_all(payload).await.unwrap();
    let mut reply = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut reply))
        .await
        .expect("echo timed out")
        .unwrap();
    reply
}

/// True once the relay has hung up (EOF or reset)
async fn is_closed(client: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    match tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf)).await {
        Ok(Ok(0)) | Ok(Err(_)) => true,
        Ok(Ok(_)) => false,
        Err(_) => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn test_ping_reaches_backend() {
    init_test_logging();
    let backend = start_echo_backend().await;
    let (relay, _) = start_relay(local_settings()).await;

    let mut client = open_tunnel(relay, &token_for(backend)).await;
    assert_eq!(echo(&mut client, b"ping").await, b"ping");
}

#[tokio::test]
async fn test_header_and_payload_in_one_write() {
    let backend = start_echo_backend().await;
    let (relay, _) = start_relay(local_settings()).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client
        .write_all(format!("{}\nping", token_for(backend)).as_bytes())
        .await
        .unwrap();

    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"ping");
}

#[tokio::test]
async fn test_malformed_header_isolated_from_concurrent_tunnel() {
    let backend = start_echo_backend().await;
    let (relay, stats) = start_relay(local_settings()).await;

    // Connection 2 is established first and kept open
    let mut good = open_tunnel(relay, &token_for(backend)).await;

    let mut bad = open_tunnel(relay, "this is not base64 at all").await;
    assert!(is_closed(&mut bad).await);

    assert_eq!(echo(&mut good, b"still here").await, b"still here");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stats.snapshot().protocol_errors, 1);
}

#[tokio::test]
async fn test_foreign_secret_rejected() {
    let backend = start_echo_backend().await;
    let (relay, _) = start_relay(local_settings()).await;

    let foreign = TokenCodec::from_bytes(b"0123456789abcdef", SALT).unwrap();
    let token = foreign.encode(&DestinationAddress::parse(&backend.to_string()).unwrap());

    let mut client = open_tunnel(relay, &token).await;
    assert!(is_closed(&mut client).await);
}

#[tokio::test]
async fn test_repeat_token_served_from_cache() {
    let backend = start_echo_backend().await;
    let (relay, stats) = start_relay(local_settings()).await;
    let token = token_for(backend);

    for round in 0..3u8 {
        let mut client = open_tunnel(relay, &token).await;
        assert_eq!(echo(&mut client, &[round; 8]).await, [round; 8]);
    }

    assert_eq!(stats.snapshot().cache_hits, 2);
}

#[tokio::test]
async fn test_many_concurrent_tunnels() {
    let backends = [start_echo_backend().await, start_echo_backend().await];
    let (relay, stats) = start_relay(local_settings()).await;
    let tokens: Vec<String> = backends.iter().map(|b| token_for(*b)).collect();

    let clients = (0..40usize).map(|i| {
        let token = tokens[i % tokens.len()].clone();
        async move {
            let mut client = open_tunnel(relay, &token).await;
            let payload = format!("client-{}-payload", i).into_bytes();
            assert_eq!(echo(&mut client, &payload).await, payload);
        }
    });
    join_all(clients).await;

    let snap = stats.snapshot();
    assert_eq!(snap.accepted, 40);
    assert_eq!(snap.protocol_errors + snap.backend_errors + snap.panics, 0);
}

#[tokio::test]
async fn test_oversized_header_rejected() {
    let (relay, stats) = start_relay(Settings {
        max_header_len: 64,
        ..local_settings()
    })
    .await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client.write_all(&[b'A'; 200]).await.unwrap();
    assert!(is_closed(&mut client).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stats.snapshot().protocol_errors, 1);
}

#[tokio::test]
async fn test_dead_backend_closes_client() {
    let dead = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let (relay, stats) = start_relay(local_settings()).await;

    let mut client = open_tunnel(relay, &token_for(dead)).await;
    assert!(is_closed(&mut client).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stats.snapshot().backend_errors, 1);
}

#[tokio::test]
async fn test_backend_close_ends_tunnel() {
    // Backend that sends a greeting and hangs up
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"bye").await.unwrap();
    });

    let (relay, stats) = start_relay(local_settings()).await;
    let mut client = open_tunnel(relay, &token_for(backend)).await;

    let mut greeting = [0u8; 3];
    client.read_exact(&mut greeting).await.unwrap();
    assert_eq!(&greeting, b"bye");

    // Client finishes its side too; relay tears both down
    client.shutdown().await.unwrap();
    assert!(is_closed(&mut client).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snap = stats.snapshot();
    assert_eq!(snap.active, 0);
    assert_eq!(snap.bytes_backend_to_client, 3);
}
