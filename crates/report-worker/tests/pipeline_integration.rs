//! End-to-end pipeline tests against a RabbitMQ container.
//!
//! Run with: cargo test -p report-worker --features integration-tests

use async_trait::async_trait;
use hotelguide_amqp::{
    ensure_topology, AggregateProducer, AmqpClient, AmqpReplyWaiterFactory, TopologyConfig,
};
use hotelguide_domain::{
    ContactRecord, ContactRepository, DomainError, DomainResult, InMemoryReportStore,
    ReportRequestService, ReportStatus,
};
use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use report_worker::{ReportService, ReportWorker, ReportWorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::rabbitmq::RabbitMq;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

async fn start_broker() -> (ContainerAsync<RabbitMq>, String) {
    let container = RabbitMq::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5672).await.unwrap();
    let url = format!("amqp://guest:guest@{host}:{port}");
    (container, url)
}

fn topology() -> TopologyConfig {
    TopologyConfig {
        exchange: "reports".to_string(),
        request_queue: "hotel.aggregates".to_string(),
        result_queue: "report.results".to_string(),
    }
}

struct FixedContacts(Vec<ContactRecord>);

#[async_trait]
impl ContactRepository for FixedContacts {
    async fn list_contacts(&self) -> DomainResult<Vec<ContactRecord>> {
        Ok(self.0.clone())
    }
}

fn istanbul_contacts() -> Vec<ContactRecord> {
    let hotels: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    vec![
        ContactRecord { location: "Istanbul".into(), hotel_id: hotels[0] },
        ContactRecord { location: "Istanbul".into(), hotel_id: hotels[1] },
        ContactRecord { location: "Istanbul".into(), hotel_id: hotels[2] },
        ContactRecord { location: "Istanbul".into(), hotel_id: hotels[0] },
        ContactRecord { location: "Istanbul".into(), hotel_id: hotels[1] },
    ]
}

fn worker_config(url: &str) -> ReportWorkerConfig {
    ReportWorkerConfig {
        amqp_url: url.to_string(),
        connect_timeout: Duration::from_secs(5),
        topology: topology(),
        prefetch_count: 10,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
    }
}

fn start_worker(
    url: &str,
    store: Arc<InMemoryReportStore>,
    ctx: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let worker = ReportWorker::new(worker_config(url), Arc::new(ReportService::new(store)));
    tokio::spawn(async move {
        worker.run(ctx).await.expect("worker run failed");
    })
}

async fn request_service(url: &str, timeout: Duration) -> ReportRequestService {
    let client = Arc::new(
        AmqpClient::connect(url, Duration::from_secs(5))
            .await
            .expect("broker connect"),
    );
    let config = topology();
    let setup = client.create_channel().await.expect("channel");
    ensure_topology(&setup, &config).await.expect("topology");

    let producer = AggregateProducer::new(&client, &config).await.expect("producer");
    let factory = AmqpReplyWaiterFactory::new(client, config);

    ReportRequestService::new(
        Arc::new(FixedContacts(istanbul_contacts())),
        Arc::new(producer),
        Arc::new(factory),
        timeout,
    )
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn round_trip_persists_and_replies() {
    let (_container, url) = start_broker().await;
    let store = Arc::new(InMemoryReportStore::new());
    let ctx = CancellationToken::new();
    let worker = start_worker(&url, store.clone(), ctx.clone());

    let service = request_service(&url, Duration::from_secs(5)).await;
    let results = service.generate_report().await.expect("round trip");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].location, "Istanbul");
    assert_eq!(results[0].hotel_count, 3);
    assert_eq!(results[0].contact_count, 5);
    assert_eq!(results[0].status, ReportStatus::Completed);
    assert_eq!(store.all_reports().await.len(), 1);

    ctx.cancel();
    worker.await.unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn timed_out_request_is_still_persisted_eventually() {
    let (_container, url) = start_broker().await;
    let store = Arc::new(InMemoryReportStore::new());
    let ctx = CancellationToken::new();

    // Publish with a 50ms timeout while no worker is running.
    let service = request_service(&url, Duration::from_millis(50)).await;
    let result = service.generate_report().await;
    assert!(matches!(result, Err(DomainError::Timeout { .. })));

    // The worker catches up afterwards; the rows become visible even though
    // the caller is long gone.
    let worker = start_worker(&url, store.clone(), ctx.clone());
    for _ in 0..50 {
        if !store.all_reports().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(store.all_reports().await.len(), 1);

    ctx.cancel();
    worker.await.unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn concurrent_requests_never_swap_replies() {
    let (_container, url) = start_broker().await;
    let store = Arc::new(InMemoryReportStore::new());
    let ctx = CancellationToken::new();
    let worker = start_worker(&url, store.clone(), ctx.clone());

    let service = Arc::new(request_service(&url, Duration::from_secs(5)).await);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        handles.push(tokio::spawn(async move { service.generate_report().await }));
    }

    for handle in handles {
        let results = handle.await.unwrap().expect("concurrent round trip");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location, "Istanbul");
    }

    ctx.cancel();
    worker.await.unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn incompatible_request_queue_stops_the_worker() {
    let (_container, url) = start_broker().await;

    // Declare the request queue with parameters the worker's topology cannot
    // accept; its own declare then fails with PRECONDITION_FAILED.
    let client = AmqpClient::connect(&url, Duration::from_secs(5))
        .await
        .expect("broker connect");
    let channel = client.create_channel().await.expect("channel");
    channel
        .queue_declare(
            "hotel.aggregates",
            QueueDeclareOptions {
                durable: false,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .expect("conflicting declare");

    let store = Arc::new(InMemoryReportStore::new());
    let worker = ReportWorker::new(worker_config(&url), Arc::new(ReportService::new(store)));

    // A topology conflict must fail the worker instead of looping on
    // reconnect; a generous bound guards against the retry path.
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        worker.run(CancellationToken::new()),
    )
    .await
    .expect("worker kept retrying a topology conflict");

    assert!(outcome.is_err());
}
