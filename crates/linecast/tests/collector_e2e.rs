//! End-to-end delivery: outbound buffer → request endpoint → collector →
//! publish endpoint and per-source logs

use std::fs;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeDelta, TimeZone, Utc};
use linecast_client::{
    OutboundBuffer, OutboundConfig, Replay, ReplayConfig, TcpUplink, TcpUplinkConfig,
};
use linecast_pipeline::Collector;
use linecast_protocol::{LineRecord, SourceId, read_frame};
use linecast_sinks::{LogStore, LogStoreConfig};
use linecast_sources::RequestListener;
use linecast_tap::{PublishServer, Publisher};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

struct Running {
    request_addr: String,
    publish_addr: String,
    publisher: Publisher,
    cancel: CancellationToken,
}

async fn start_collector(log_dir: &Path) -> Running {
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(64);
    let listener = RequestListener::bind("127.0.0.1:0", tx).await.unwrap();
    let request_addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(listener.run(cancel.clone()));

    let publisher = Publisher::default();
    let server = PublishServer::bind("127.0.0.1:0", publisher.clone())
        .await
        .unwrap();
    let publish_addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run(cancel.clone()));

    let collector = Collector::new()
        .with_inbound(rx)
        .with_publisher(publisher.clone())
        .with_store(LogStore::new(LogStoreConfig::default().with_dir(log_dir)));
    tokio::spawn(collector.run(cancel.clone()));

    Running {
        request_addr,
        publish_addr,
        publisher,
        cancel,
    }
}

fn buffer(addr: &str) -> OutboundBuffer<TcpUplink> {
    OutboundBuffer::new(
        TcpUplink::new(TcpUplinkConfig::new(addr)),
        OutboundConfig::default().with_reconnect_interval(
            Duration::from_millis(10),
            Duration::from_millis(50),
        ),
    )
}

async fn wait_for_subscribers(publisher: &Publisher, n: usize) {
    for _ in 0..300 {
        if publisher.subscriber_count() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} subscribers");
}

async fn wait_for_file(path: &Path, lines: usize) -> String {
    for _ in 0..300 {
        if let Ok(content) = fs::read_to_string(path)
            && content.lines().count() >= lines
        {
            return content;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never reached {lines} lines", path.display());
}

// ============================================================================
// Live delivery
// ============================================================================

#[tokio::test]
async fn test_lines_delivered_published_and_persisted() {
    let dir = TempDir::new().unwrap();
    let running = start_collector(dir.path()).await;

    let mut subscriber = TcpStream::connect(&running.publish_addr).await.unwrap();
    wait_for_subscribers(&running.publisher, 1).await;

    let source = SourceId::new("koerkana1_4");
    let base = Utc.with_ymd_and_hms(2015, 1, 14, 13, 41, 37).unwrap();
    let records: Vec<LineRecord> = ["one", "two", "three"]
        .iter()
        .enumerate()
        .map(|(i, text)| LineRecord {
            source_id: source.clone(),
            sequence: i as u32,
            raw_text: Bytes::copy_from_slice(text.as_bytes()),
            capture_time: Utc::now(),
            corrected_time: base + TimeDelta::milliseconds(i as i64),
            broken: i == 2,
        })
        .collect();

    let mut buffer = buffer(&running.request_addr);
    for record in &records {
        buffer.enqueue(record.clone());
    }
    for _ in 0..300 {
        buffer.tick(Utc::now()).await;
        if buffer.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(buffer.is_empty(), "window never drained");
    let snapshot = buffer.metrics().snapshot();
    assert_eq!(snapshot.lines_acked, 3);
    assert_eq!(snapshot.batches_acked, 1);

    // Republished verbatim, in order, one message per line
    for record in &records {
        let frame = timeout(Duration::from_secs(2), read_frame(&mut subscriber))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(frame, record.to_wire().as_bytes());
    }

    // Persisted without source and sequence
    let content = wait_for_file(&dir.path().join("log_koerkana1_4.log"), 3).await;
    assert_eq!(
        content,
        "2015-01-14T13:41:37.000Z 'one'\n\
         2015-01-14T13:41:37.001Z 'two'\n\
         x2015-01-14T13:41:37.002Z 'three'\n"
    );

    running.cancel.cancel();
}

#[tokio::test]
async fn test_lines_survive_collector_starting_late() {
    let dir = TempDir::new().unwrap();

    // Reserve an address nobody listens on yet
    let reserved = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = reserved.local_addr().unwrap();
    drop(reserved);

    let mut buffer = buffer(&addr.to_string());
    buffer.enqueue(LineRecord {
        source_id: SourceId::new("late_1"),
        sequence: 0,
        raw_text: Bytes::from_static(b"waited"),
        capture_time: Utc::now(),
        corrected_time: Utc.with_ymd_and_hms(2015, 1, 14, 13, 41, 37).unwrap(),
        broken: false,
    });
    for _ in 0..5 {
        buffer.tick(Utc::now()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(buffer.len(), 1);

    // Bring the collector up on the reserved address
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(64);
    let listener = RequestListener::bind(&addr.to_string(), tx).await.unwrap();
    tokio::spawn(listener.run(cancel.clone()));
    let collector = Collector::new()
        .with_inbound(rx)
        .with_store(LogStore::new(LogStoreConfig::default().with_dir(dir.path())));
    tokio::spawn(collector.run(cancel.clone()));

    for _ in 0..300 {
        buffer.tick(Utc::now()).await;
        if buffer.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(buffer.is_empty());

    let content = wait_for_file(&dir.path().join("log_late_1.log"), 1).await;
    assert_eq!(content, "2015-01-14T13:41:37.000Z 'waited'\n");

    cancel.cancel();
}

// ============================================================================
// Replay
// ============================================================================

#[tokio::test]
async fn test_replayed_log_reproduces_original() {
    let original_dir = TempDir::new().unwrap();
    let original = original_dir.path().join("log_koerkana1_4.log");
    let content = "2015-01-14T13:41:37.903Z 'boot'\n\
                   x2015-01-14T13:41:38.000Z 'half a li'\n\
                   2015-01-14T13:41:39.120Z \"it's done\"\n";
    fs::write(&original, content).unwrap();

    let collected_dir = TempDir::new().unwrap();
    let running = start_collector(collected_dir.path()).await;

    let replay = Replay::open(
        &original,
        None,
        buffer(&running.request_addr),
        ReplayConfig::default(),
    )
    .await
    .unwrap();
    let snapshot = timeout(Duration::from_secs(5), replay.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.lines_read, 3);
    assert_eq!(snapshot.lines_skipped, 0);

    let replayed = wait_for_file(&collected_dir.path().join("log_koerkana1_4.log"), 3).await;
    assert_eq!(replayed, content);

    running.cancel.cancel();
}
