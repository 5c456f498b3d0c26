use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use lagkeeper::core::ManualClock;
use lagkeeper::lifecycle;
use lagkeeper::network::MetricsServer;
use lagkeeper::{CacheSettings, ConsumerPartitionOffset, OffsetCache, PartitionWaterMark};

async fn request(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn serves_metrics_and_healthcheck() {
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_000, 0).unwrap()));
    let (cache, inputs) = OffsetCache::start(&CacheSettings::default(), clock);

    inputs
        .offsets
        .send(ConsumerPartitionOffset {
            group: "billing".to_string(),
            topic: "invoices".to_string(),
            partition: 0,
            offset: 100,
            committed_at: Utc.timestamp_opt(10, 0).unwrap(),
        })
        .await
        .unwrap();
    inputs
        .watermarks
        .send(PartitionWaterMark {
            topic: "invoices".to_string(),
            partition: 0,
            high_offset: 150,
            low_offset: Some(0),
            observed_at: Utc.timestamp_opt(20, 0).unwrap(),
        })
        .await
        .unwrap();
    cache.flush().await;

    let server = MetricsServer::bind("127.0.0.1:0", cache.reader(), "lk").await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server_task = tokio::spawn(server.run(shutdown.clone()));

    let metrics = request(addr, "GET /metrics HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert!(metrics.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(metrics.contains("Content-Type: text/plain; version=0.0.4"));
    assert!(metrics.contains("lk_group_topic_partition_lag{group=\"billing\",partition=\"0\",topic=\"invoices\"} 50\n"));

    let health = request(addr, "GET /healthcheck HTTP/1.1\r\n\r\n").await;
    assert!(health.ends_with("Status: Healthy"));

    let missing = request(addr, "GET /nope HTTP/1.1\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    let wrong_method = request(addr, "POST /metrics HTTP/1.1\r\n\r\n").await;
    assert!(wrong_method.starts_with("HTTP/1.1 405"));

    let garbage = request(addr, "hello\r\n\r\n").await;
    assert!(garbage.starts_with("HTTP/1.1 400"));

    // scrapes keep working after the cache has shut down
    drop(inputs);
    cache.shutdown().await;
    let after = request(addr, "GET /metrics HTTP/1.1\r\n\r\n").await;
    assert!(after.contains("} 50\n"));

    shutdown.cancel();
    server_task.await.unwrap();
}

#[tokio::test]
async fn endpoint_outlives_cache_drain_on_shutdown() {
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_000, 0).unwrap()));
    let (cache, inputs) = OffsetCache::start(&CacheSettings::default(), clock);
    inputs
        .offsets
        .send(ConsumerPartitionOffset {
            group: "billing".to_string(),
            topic: "invoices".to_string(),
            partition: 0,
            offset: 7,
            committed_at: Utc.timestamp_opt(10, 0).unwrap(),
        })
        .await
        .unwrap();

    let server = MetricsServer::bind("127.0.0.1:0", cache.reader(), "lk").await.unwrap();
    let addr = server.local_addr().unwrap();
    let endpoint = CancellationToken::new();
    let server_task = tokio::spawn(server.run(endpoint.clone()));

    // inputs are still open, so the drain cannot finish yet
    let stopping = tokio::spawn(lifecycle::shutdown(cache, endpoint.clone(), server_task));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!stopping.is_finished());
    assert!(!endpoint.is_cancelled());

    let during = request(addr, "GET /metrics HTTP/1.1\r\n\r\n").await;
    assert!(during.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(during.contains("lk_group_topic_partition_offset{group=\"billing\",partition=\"0\",topic=\"invoices\"} 7\n"));

    drop(inputs);
    tokio::time::timeout(std::time::Duration::from_secs(5), stopping)
        .await
        .unwrap()
        .unwrap();
    assert!(endpoint.is_cancelled());
    assert!(TcpStream::connect(addr).await.is_err());
}
