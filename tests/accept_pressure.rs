//! Listener behaviour when the process runs out of file descriptors
//!
//! Lowers the soft `RLIMIT_NOFILE` of the whole test process, so it lives in
//! its own test binary.

#![cfg(unix)]

use std::fs::File;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tunnelgate_core::DestinationAddress;
use tunnelgate_crypto::TokenCodec;
use tunnelgate_daemon::TunnelServer;
use tunnelgate_settings::Settings;

const SECRET: &[u8] = b"an-example-very-secret-key-32byt";
const SALT: &[u8] = b"v1";

// =============================================================================
// HELPERS
// =============================================================================

fn nofile_limit() -> libc::rlimit {
    let mut lim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we pass
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) }, 0);
    lim
}

fn set_soft_nofile(soft: libc::rlim_t) {
    let mut lim = nofile_limit();
    lim.rlim_cur = soft;
    // SAFETY: setrlimit only reads the struct we pass
    assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &lim) }, 0);
}

fn open_fd_count() -> usize {
    std::fs::read_dir("/dev/fd").unwrap().count()
}

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

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn test_listener_survives_descriptor_exhaustion() {
    let backend = start_echo_backend().await;
    let codec = TokenCodec::from_bytes(SECRET, SALT).unwrap();
    let token = codec.encode(&DestinationAddress::parse(&backend.to_string()).unwrap());

    let settings = Settings {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..Settings::default()
    };
    let server = TunnelServer::from_settings(&settings, codec).await.unwrap();
    let relay = server.local_addr().unwrap();
    let stats = server.stats();
    let handle = tokio::spawn(server.run());
    tokio::task::yield_now().await;

    let original = nofile_limit();
    set_soft_nofile((open_fd_count() + 16) as libc::rlim_t);

    // Completes in the kernel backlog; the server has no fd left to accept it
    let queued = std::net::TcpStream::connect(relay).unwrap();
    let mut fillers = Vec::new();
    while let Ok(file) = File::open("/dev/null") {
        fillers.push(file);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    let still_running = !handle.is_finished();
    let accept_errors = stats.snapshot().accept_errors;

    drop(fillers);
    set_soft_nofile(original.rlim_cur);

    assert!(still_running, "listener stopped while out of descriptors");
    assert!(accept_errors >= 1);

    // Descriptors are back: new tunnels go through again
    let mut client = TcpStream::connect(relay).await.unwrap();
    client
        .write_all(format!("{}\nping", token).as_bytes())
        .await
        .unwrap();
    let mut reply = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut reply))
        .await
        .expect("tunnel timed out after descriptors were freed")
        .unwrap();
    assert_eq!(&reply, b"ping");
    assert!(!handle.is_finished());

    drop(queued);
}
