//! End-to-end scenarios (spec §8's literal examples), driven over a real
//! TCP connection against a fully running server. Grounded on the
//! teacher's own `tests/mod.rs` convention — a `#[cfg(test)] mod tests`
//! colocated in the binary crate (not a `tests/` integration directory,
//! since Gibson, like `skyd`, has no separate library target) that spins
//! up the real async machinery and drives it with a real client socket
//! rather than mocking the protocol layer.
//!
//! The server under test runs on its own OS thread with its own
//! current-thread runtime + `LocalSet` (exactly as `main.rs` builds it);
//! the test itself runs under the default multi-threaded `#[tokio::test]`
//! runtime, playing the role of a separate client process.

use std::net::TcpListener as StdTcpListener;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::server::Server;

/// Spawns a real server on an OS-assigned port and returns that port.
/// Binding with `std::net::TcpListener` first (then dropping it) lets the
/// test know the port before the server thread starts listening, without
/// needing a readiness channel back from the reactor thread.
fn spawn_server() -> u16 {
    spawn_server_with(|_| {})
}

/// Like `spawn_server`, but lets a test tune config knobs (e.g.
/// `max_idletime`) before the server starts.
fn spawn_server_with(customize: impl FnOnce(&mut Config)) -> u16 {
    let std_listener = StdTcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let port = std_listener.local_addr().unwrap().port();
    drop(std_listener);

    std::thread::spawn(move || {
        let mut config = Config::default();
        config.port = port;
        config.cron_period = 50;
        customize(&mut config);
        let server = Server::new(config);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build test runtime");
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, async move {
            let (shutdown_tx, _rx) = tokio::sync::broadcast::channel(1);
            let cron = crate::cron::run(server.clone(), shutdown_tx.clone());
            let serve = crate::dbnet::serve(server, shutdown_tx);
            tokio::select! {
                _ = cron => {}
                _ = serve => {}
            }
        });
    });

    port
}

async fn connect(port: u16) -> TcpStream {
    for _ in 0..200 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("server never started accepting connections on port {port}");
}

fn frame(opcode: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let payload_len = (2 + body.len()) as u32;
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.extend_from_slice(&opcode.to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn len_prefixed(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

const OP_SET: u16 = 1;
const OP_TTL: u16 = 2;
const OP_GET: u16 = 3;
const OP_DEL: u16 = 4;
const OP_INC: u16 = 5;
const OP_COUNT: u16 = 9;
const OP_META: u16 = 10;
const OP_KEYS: u16 = 11;
const OP_MLOCK: u16 = 107;
const OP_MUNLOCK: u16 = 108;
const OP_MDEL: u16 = 104;

const CODE_OK: u16 = 0;
const CODE_VAL: u16 = 1;
const CODE_KVAL: u16 = 2;
const CODE_NOT_FOUND: u16 = 3;
const CODE_LOCKED: u16 = 4;

async fn roundtrip(stream: &mut TcpStream, req: Vec<u8>) -> (u16, Vec<u8>) {
    stream.write_all(&req).await.expect("write request");
    let mut size_buf = [0u8; 4];
    stream.read_exact(&mut size_buf).await.expect("read reply size");
    let size = u32::from_le_bytes(size_buf) as usize;
    let mut body = vec![0u8; size];
    stream.read_exact(&mut body).await.expect("read reply body");
    let code = u16::from_le_bytes([body[0], body[1]]);
    (code, body[2..].to_vec())
}

fn set_request(key: &[u8], value: &[u8], ttl: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(len_prefixed(key));
    body.extend(len_prefixed(value));
    body.extend_from_slice(&ttl.to_le_bytes());
    frame(OP_SET, &body)
}

fn key_request(opcode: u16, key: &[u8]) -> Vec<u8> {
    frame(opcode, &len_prefixed(key))
}

fn lock_request(opcode: u16, key_or_prefix: &[u8], seconds: u32) -> Vec<u8> {
    let mut body = len_prefixed(key_or_prefix);
    body.extend_from_slice(&seconds.to_le_bytes());
    frame(opcode, &body)
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let port = spawn_server();
    let mut stream = connect(port).await;

    let (code, _) = roundtrip(&mut stream, set_request(b"foo", b"bar", 0)).await;
    assert_eq!(code, CODE_OK);

    let (code, body) = roundtrip(&mut stream, key_request(OP_GET, b"foo")).await;
    assert_eq!(code, CODE_VAL);
    // encoding byte, then u32 len, then value
    let len = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as usize;
    assert_eq!(&body[5..5 + len], b"bar");
}

#[tokio::test]
async fn mlock_blocks_set_until_munlock() {
    let port = spawn_server();
    let mut stream = connect(port).await;

    roundtrip(&mut stream, set_request(b"foo", b"bar", 0)).await;
    let (code, _) = roundtrip(&mut stream, lock_request(OP_MLOCK, b"f", 60)).await;
    assert_eq!(code, CODE_OK);

    let (code, _) = roundtrip(&mut stream, set_request(b"foo", b"new", 0)).await;
    assert_eq!(code, CODE_LOCKED);

    let (code, _) = roundtrip(&mut stream, key_request(OP_MUNLOCK, b"f")).await;
    assert_eq!(code, CODE_OK);

    let (code, _) = roundtrip(&mut stream, set_request(b"foo", b"new", 0)).await;
    assert_eq!(code, CODE_OK);
}

#[tokio::test]
async fn inc_on_numeric_string() {
    let port = spawn_server();
    let mut stream = connect(port).await;

    roundtrip(&mut stream, set_request(b"n", b"41", 0)).await;
    let (code, body) = roundtrip(&mut stream, key_request(OP_INC, b"n")).await;
    assert_eq!(code, CODE_VAL);
    let len = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as usize;
    assert_eq!(&body[5..5 + len], b"42");
}

#[tokio::test]
async fn large_value_compresses_and_round_trips() {
    let port = spawn_server();
    let mut stream = connect(port).await;

    let value = vec![0u8; 5000];
    roundtrip(&mut stream, set_request(b"k", &value, 0)).await;

    let (code, body) = roundtrip(&mut stream, key_request(OP_GET, b"k")).await;
    assert_eq!(code, CODE_VAL);
    let encoding = body[0];
    assert_eq!(encoding, 2); // Encoding::Compressed
    let len = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as usize;
    assert_eq!(len, 5000);
    assert_eq!(&body[5..5 + len], &value[..]);

    let mut meta_body = len_prefixed(b"k");
    meta_body.push(1); // MetaField::Encoding
    let (code, body) = roundtrip(&mut stream, frame(OP_META, &meta_body)).await;
    assert_eq!(code, CODE_VAL);
    let len = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as usize;
    assert_eq!(&body[5..5 + len], b"2");
}

#[tokio::test]
async fn ttl_expiry_returns_not_found() {
    let port = spawn_server();
    let mut stream = connect(port).await;

    roundtrip(&mut stream, set_request(b"a", b"x", 0)).await;
    roundtrip(&mut stream, {
        let mut body = len_prefixed(b"a");
        body.extend_from_slice(&1u32.to_le_bytes());
        frame(OP_TTL, &body)
    })
    .await;

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let (code, _) = roundtrip(&mut stream, key_request(OP_GET, b"a")).await;
    assert_eq!(code, CODE_NOT_FOUND);
}

#[tokio::test]
async fn keys_and_mdel_over_a_prefix() {
    let port = spawn_server();
    let mut stream = connect(port).await;

    roundtrip(&mut stream, set_request(b"/u/1", b"a", 0)).await;
    roundtrip(&mut stream, set_request(b"/u/2", b"b", 0)).await;
    roundtrip(&mut stream, set_request(b"/v/1", b"c", 0)).await;

    let (code, body) = roundtrip(&mut stream, key_request(OP_KEYS, b"/u/")).await;
    assert_eq!(code, CODE_KVAL);
    let count = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    assert_eq!(count, 2);

    roundtrip(&mut stream, key_request(OP_MDEL, b"/u/")).await;

    let (code, body) = roundtrip(&mut stream, key_request(OP_COUNT, b"/u/1")).await;
    assert_eq!(code, CODE_VAL);
    let len = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as usize;
    assert_eq!(&body[5..5 + len], b"0");

    let (code, _) = roundtrip(&mut stream, key_request(OP_DEL, b"/v/1")).await;
    assert_eq!(code, CODE_OK);
}
