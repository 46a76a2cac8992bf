//! Request listener tests

use std::time::Duration;

use linecast_protocol::{ACK_PAYLOAD, read_frame, write_frame};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;

// ============================================================================
// Helper Functions
// ============================================================================

async fn start_listener() -> (
    SocketAddr,
    mpsc::Receiver<InboundBatch>,
    Arc<ListenerMetrics>,
    CancellationToken,
) {
    let (tx, rx) = mpsc::channel(16);
    let listener = RequestListener::bind("127.0.0.1:0", tx).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics = listener.metrics();
    let cancel = CancellationToken::new();
    tokio::spawn(listener.run(cancel.clone()));
    (addr, rx, metrics, cancel)
}

// ============================================================================
// InboundBatch
// ============================================================================

#[tokio::test]
async fn test_acknowledge_delivers_reply() {
    let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
    let (batch, rx) = InboundBatch::new(Bytes::from_static(b"a 000000 x"), peer);

    let (payload, delivered) = batch.acknowledge(ACK_PAYLOAD);
    assert!(delivered);
    assert_eq!(payload, &b"a 000000 x"[..]);
    assert_eq!(rx.await.unwrap(), ACK_PAYLOAD);
}

#[test]
fn test_acknowledge_after_peer_gone() {
    let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
    let (batch, rx) = InboundBatch::new(Bytes::from_static(b"line"), peer);
    drop(rx);

    let (payload, delivered) = batch.acknowledge(ACK_PAYLOAD);
    assert!(!delivered);
    assert_eq!(payload, &b"line"[..]);
}

// ============================================================================
// Network
// ============================================================================

#[tokio::test]
async fn test_bind_failure() {
    let (tx, _rx) = mpsc::channel(1);
    let err = RequestListener::bind("256.0.0.1:0", tx).await.err().unwrap();
    assert!(matches!(err, SourceError::Bind { .. }));
}

#[tokio::test]
async fn test_request_reply_round_trip() {
    let (addr, mut rx, metrics, cancel) = start_listener().await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut client, b"one\ntwo").await.unwrap();

    let batch = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.payload, &b"one\ntwo"[..]);
    batch.acknowledge(ACK_PAYLOAD);

    let reply = timeout(Duration::from_secs(2), read_frame(&mut client))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply, ACK_PAYLOAD);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.connections_total, 1);
    assert_eq!(snapshot.batches_received, 1);
    assert_eq!(snapshot.bytes_received, 7);

    cancel.cancel();
}

#[tokio::test]
async fn test_next_request_waits_for_reply() {
    let (addr, mut rx, _metrics, cancel) = start_listener().await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut client, b"first").await.unwrap();
    write_frame(&mut client, b"second").await.unwrap();

    let first = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.payload, &b"first"[..]);

    // The second frame is not read until the first is answered
    assert!(
        timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err()
    );

    first.acknowledge(ACK_PAYLOAD);
    let second = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.payload, &b"second"[..]);

    cancel.cancel();
}

#[tokio::test]
async fn test_multiple_connections() {
    let (addr, mut rx, metrics, cancel) = start_listener().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut a, b"from a").await.unwrap();
    write_frame(&mut b, b"from b").await.unwrap();

    let mut payloads = Vec::new();
    for _ in 0..2 {
        let batch = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        payloads.push(batch.payload.clone());
        batch.acknowledge(ACK_PAYLOAD);
    }
    payloads.sort();
    assert_eq!(payloads, vec![&b"from a"[..], &b"from b"[..]]);

    assert_eq!(read_frame(&mut a).await.unwrap().unwrap(), ACK_PAYLOAD);
    assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), ACK_PAYLOAD);
    assert_eq!(metrics.snapshot().connections_total, 2);

    cancel.cancel();
}
