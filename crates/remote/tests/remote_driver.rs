mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, unreachable_address, RecordingObserver, StubBackend, StubConfig};
use pipeline::{
    ComponentDescriptor, Document, DocumentId, Driver, DriverError, EndpointAddress,
    NullPerformanceSink,
};
use remote::{remote_driver, transport, HttpTransportConfig, RemoteDriver};

fn probe() -> Document {
    Document::new(DocumentId::new("probe").unwrap(), "The quick brown fox.")
}

fn driver_with(config: HttpTransportConfig, observer: Arc<RecordingObserver>) -> RemoteDriver {
    remote_driver(config).unwrap().with_observer(observer)
}

#[tokio::test]
async fn test_negotiates_contract_and_captures_typesystem() {
    let stub = StubBackend::start(StubConfig::default()).await;
    let driver = remote_driver(fast_config()).unwrap();

    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    let typesystem = driver.typesystem(id).unwrap();
    assert_eq!(typesystem.media_type, "application/xml");
    assert_eq!(typesystem.body, "<typeSystemDescription/>");
    assert_eq!(driver.instance_count(), 1);
}

#[tokio::test]
async fn test_probes_until_backend_becomes_ready() {
    let stub = StubBackend::start(StubConfig {
        unready_probes: 3,
        ..StubConfig::default()
    })
    .await;
    let observer = Arc::new(RecordingObserver::default());
    let driver = driver_with(fast_config(), observer.clone());

    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    assert_eq!(observer.failed_probes.load(Ordering::SeqCst), 3);
    assert_eq!(observer.ready.load(Ordering::SeqCst), 1);
    assert_eq!(stub.stats.probes.load(Ordering::SeqCst), 4);
    assert!(observer.reasons.lock().unwrap()[0].contains("503"));
}

#[tokio::test]
async fn test_unreachable_backend_times_out_without_registering() {
    let observer = Arc::new(RecordingObserver::default());
    let config = HttpTransportConfig {
        negotiation_timeout: Duration::from_millis(300),
        ..fast_config()
    };
    let driver = driver_with(config, observer.clone());

    let descriptor = ComponentDescriptor::remote(unreachable_address()).unwrap();
    let started = std::time::Instant::now();
    let err = driver.instantiate(&descriptor, &probe(), false).await.unwrap_err();

    assert!(matches!(err, DriverError::NegotiationTimeout { attempts, .. } if attempts >= 1));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(driver.instance_count(), 0);
    assert!(observer.failed_probes.load(Ordering::SeqCst) >= 1);
    assert_eq!(observer.ready.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stalled_typesystem_counts_against_the_negotiation_budget() {
    let stub = StubBackend::start(StubConfig {
        typesystem_delay: Duration::from_secs(3),
        ..StubConfig::default()
    })
    .await;
    let config = HttpTransportConfig {
        negotiation_timeout: Duration::from_millis(300),
        ..fast_config()
    };
    let driver = remote_driver(config).unwrap();

    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let started = std::time::Instant::now();
    let err = driver.instantiate(&descriptor, &probe(), false).await.unwrap_err();

    assert!(matches!(err, DriverError::NegotiationTimeout { attempts: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(driver.instance_count(), 0);
}

#[tokio::test]
async fn test_unknown_format_is_a_protocol_mismatch() {
    let stub = StubBackend::start(StubConfig {
        format: "xmi",
        ..StubConfig::default()
    })
    .await;
    let driver = remote_driver(fast_config()).unwrap();

    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let err = driver.instantiate(&descriptor, &probe(), false).await.unwrap_err();
    assert!(matches!(err, DriverError::ProtocolMismatch { .. }));
    assert_eq!(driver.instance_count(), 0);
}

#[tokio::test]
async fn test_incompatible_major_version_is_a_protocol_mismatch() {
    let stub = StubBackend::start(StubConfig {
        version: Some("2.0"),
        ..StubConfig::default()
    })
    .await;
    let driver = remote_driver(fast_config()).unwrap();

    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    assert!(matches!(
        driver.instantiate(&descriptor, &probe(), false).await,
        Err(DriverError::ProtocolMismatch { .. })
    ));
}

#[tokio::test]
async fn test_skip_verification_makes_no_requests() {
    let stub = StubBackend::start(StubConfig::default()).await;
    let observer = Arc::new(RecordingObserver::default());
    let driver = driver_with(fast_config(), observer.clone());

    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let id = driver.instantiate(&descriptor, &probe(), true).await.unwrap();

    assert_eq!(stub.stats.probes.load(Ordering::SeqCst), 0);
    assert_eq!(observer.skipped.load(Ordering::SeqCst), 1);
    assert!(driver.typesystem(id).unwrap().is_empty());

    let mut doc = probe();
    driver.run(id, &mut doc, &NullPerformanceSink).await.unwrap();
    assert_eq!(doc.annotations.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ten_concurrent_runs_against_three_handles() {
    let stub = StubBackend::start(StubConfig {
        process_delay: Duration::from_millis(40),
        ..StubConfig::default()
    })
    .await;
    let driver = Arc::new(remote_driver(fast_config()).unwrap());
    let descriptor = ComponentDescriptor::remote(&stub.address)
        .unwrap()
        .with_concurrency(3);
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let driver = driver.clone();
        tasks.push(tokio::spawn(async move {
            let mut doc = Document::new(DocumentId::new(format!("doc-{i}")).unwrap(), format!("text {i}"));
            driver.run(id, &mut doc, &NullPerformanceSink).await.map(|_| doc)
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let doc = task.await.unwrap().unwrap();
        assert_eq!(doc.annotations[0].features["text"], format!("text {i}"));
    }

    assert_eq!(stub.stats.processed.load(Ordering::SeqCst), 10);
    assert!(stub.stats.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(driver.available_handles(id).unwrap(), 3);
}

#[tokio::test]
async fn test_backend_error_is_a_transport_failure_and_handle_returns() {
    let stub = StubBackend::start(StubConfig {
        fail_process: true,
        ..StubConfig::default()
    })
    .await;
    let driver = remote_driver(fast_config()).unwrap();
    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    for _ in 0..3 {
        let mut doc = probe();
        let err = driver.run(id, &mut doc, &NullPerformanceSink).await.unwrap_err();
        assert!(matches!(&err, DriverError::TransportFailure { message, .. } if message.contains("500")));
        assert!(doc.annotations.is_empty());
    }
    assert_eq!(driver.available_handles(id).unwrap(), 1);
}

#[tokio::test]
async fn test_undecodable_response_is_a_codec_error() {
    let stub = StubBackend::start(StubConfig {
        garbage_response: true,
        ..StubConfig::default()
    })
    .await;
    let driver = remote_driver(fast_config()).unwrap();
    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    let mut doc = probe();
    let err = driver.run(id, &mut doc, &NullPerformanceSink).await.unwrap_err();
    assert!(matches!(err, DriverError::Codec(_)));
    assert!(!err.retry_policy().is_retryable());
    assert_eq!(driver.available_handles(id).unwrap(), 1);
}

#[tokio::test]
async fn test_parameters_are_forwarded_with_json_format() {
    let stub = StubBackend::start(StubConfig::default()).await;
    let driver = remote_driver(fast_config()).unwrap();
    let descriptor = ComponentDescriptor::remote(&stub.address)
        .unwrap()
        .with_parameter("language", "de");
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    let mut doc = probe();
    driver.run(id, &mut doc, &NullPerformanceSink).await.unwrap();
    assert_eq!(doc.annotations[0].features["parameters"]["language"], "de");
}

#[tokio::test]
async fn test_plain_text_backends_receive_raw_text() {
    let stub = StubBackend::start(StubConfig {
        format: "text",
        ..StubConfig::default()
    })
    .await;
    let driver = remote_driver(fast_config()).unwrap();
    let descriptor = ComponentDescriptor::remote(&stub.address).unwrap();
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    let mut doc = probe();
    driver.run(id, &mut doc, &NullPerformanceSink).await.unwrap();
    assert_eq!(doc.annotations[0].features["text"], "The quick brown fox.");
    assert_eq!(doc.annotations[0].end, doc.text.len());
}

#[tokio::test]
async fn test_handles_spread_across_addresses() {
    let a = StubBackend::start(StubConfig {
        process_delay: Duration::from_millis(30),
        ..StubConfig::default()
    })
    .await;
    let b = StubBackend::start(StubConfig {
        process_delay: Duration::from_millis(30),
        ..StubConfig::default()
    })
    .await;
    let driver = Arc::new(remote_driver(fast_config()).unwrap());
    let descriptor = ComponentDescriptor::remote(&a.address)
        .unwrap()
        .with_address(&b.address)
        .with_concurrency(2);
    let id = driver.instantiate(&descriptor, &probe(), false).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let driver = driver.clone();
        tasks.push(tokio::spawn(async move {
            let mut doc = probe();
            driver.run(id, &mut doc, &NullPerformanceSink).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(a.stats.processed.load(Ordering::SeqCst), 1);
    assert_eq!(b.stats.processed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_addresses_disagreeing_on_format_are_rejected() {
    let a = StubBackend::start(StubConfig::default()).await;
    let b = StubBackend::start(StubConfig {
        format: "text",
        ..StubConfig::default()
    })
    .await;
    let driver = remote_driver(fast_config()).unwrap();
    let descriptor = ComponentDescriptor::remote(&a.address)
        .unwrap()
        .with_address(&b.address);
    assert!(matches!(
        driver.instantiate(&descriptor, &probe(), false).await,
        Err(DriverError::ProtocolMismatch { .. })
    ));
    assert_eq!(driver.instance_count(), 0);
}

#[tokio::test]
async fn test_documentation_is_fetched() {
    let stub = StubBackend::start(StubConfig::default()).await;
    let driver = remote_driver(fast_config()).unwrap();
    let address = EndpointAddress::new(&stub.address).unwrap();
    let docs = transport::fetch_documentation(driver.backend().client(), &address)
        .await
        .unwrap();
    assert_eq!(docs.as_deref(), Some("Echoes its input as one annotation."));
}
