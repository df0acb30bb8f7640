//! Readiness probe tests against real sockets and the embedded driver

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dballoc_core::allocator::AllocationStrategy;
use dballoc_core::config::keys;
use dballoc_core::driver::{Driver, DriverConnection, LocalRepositoryResolver};
use dballoc_core::probe::RETRY_INTERVAL;
use dballoc_core::{
    Allocator, AllocatorContext, DescriptorSpec, DriverRegistry, DriverResolver, Error, Prober,
    Properties, Result,
};
use tempfile::TempDir;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_tcp_probe_succeeds_on_first_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let started = Instant::now();
    let ready = Prober::new()
        .wait_for_tcp(
            "127.0.0.1",
            port,
            Duration::from_millis(500),
            Duration::from_secs(5),
        )
        .await;
    assert!(ready);
    assert!(started.elapsed() < RETRY_INTERVAL);
}

#[tokio::test]
async fn test_tcp_probe_gives_up_after_overall_timeout() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let overall = Duration::from_millis(1500);
    let started = Instant::now();
    let ready = Prober::new()
        .wait_for_tcp("127.0.0.1", port, Duration::from_millis(200), overall)
        .await;
    let elapsed = started.elapsed();

    assert!(!ready);
    assert!(elapsed >= overall, "gave up early after {:?}", elapsed);
    assert!(elapsed <= overall + 2 * RETRY_INTERVAL, "took {:?}", elapsed);
}

#[tokio::test]
async fn test_embedded_heartbeat_first_attempt() {
    common::init_test_logging();
    let repo = TempDir::new().unwrap();
    common::install_jar(repo.path(), "com.h2database", "h2", common::H2_VERSION);

    let props = common::embedded_props();
    let allocator = Allocator::from_properties(&props).unwrap();
    let mut spec = allocator.allocate_db().await.unwrap().to_spec();
    spec.heartbeat_statement = Some("SELECT 1".into());
    let db = spec.build();

    let jar = LocalRepositoryResolver::new(repo.path())
        .resolve(db.db_driver_artifact().unwrap())
        .unwrap();

    let started = Instant::now();
    let ready = Prober::new()
        .heartbeat(&props, &db, &jar, &DriverRegistry::with_builtin())
        .await
        .unwrap();
    assert!(ready);
    assert!(started.elapsed() < RETRY_INTERVAL);
}

struct CountingDriver {
    connects: Arc<AtomicUsize>,
}

impl Driver for CountingDriver {
    fn name(&self) -> &str {
        "test.CountingDriver"
    }

    fn accepts_url(&self, _url: &str) -> bool {
        true
    }

    fn connect(
        &self,
        _url: &str,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> Result<Box<dyn DriverConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Err(Error::sql("connection refused"))
    }
}

#[tokio::test]
async fn test_timeout_below_minimum_fails_before_connecting() {
    let artifact = tempfile::NamedTempFile::new().unwrap();
    let connects = Arc::new(AtomicUsize::new(0));
    let drivers = DriverRegistry::new();
    let counter = Arc::clone(&connects);
    drivers.register("test.CountingDriver", move |_| {
        Ok(Arc::new(CountingDriver {
            connects: Arc::clone(&counter),
        }) as Arc<dyn Driver>)
    });

    let db = DescriptorSpec {
        ds_url: Some("jdbc:test://nowhere".into()),
        ds_driver_class_name: Some("test.CountingDriver".into()),
        heartbeat_statement: Some("SELECT 1".into()),
        ..Default::default()
    }
    .build();
    let props = Properties::new().with(keys::HEARTBEAT_TIMEOUT, "50");

    let err = Prober::new()
        .heartbeat(&props, &db, artifact.path(), &drivers)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blank_heartbeat_is_skipped() {
    let db = DescriptorSpec {
        ds_url: Some("jdbc:test://nowhere".into()),
        heartbeat_statement: Some("   ".into()),
        ..Default::default()
    }
    .build();
    let props = Properties::new().with(keys::HEARTBEAT_TIMEOUT, "1000");

    // No driver registered and no artifact on disk: any attempt would fail
    let ready = Prober::new()
        .heartbeat(
            &props,
            &db,
            std::path::Path::new("/nonexistent/driver.jar"),
            &DriverRegistry::new(),
        )
        .await
        .unwrap();
    assert!(ready);
}

#[tokio::test]
async fn test_provision_embedded_through_context() {
    let repo = TempDir::new().unwrap();
    let jar = common::install_jar(repo.path(), "com.h2database", "h2", common::H2_VERSION);

    let ctx = AllocatorContext::new(common::embedded_props());
    let provisioned = ctx
        .provision(&LocalRepositoryResolver::new(repo.path()))
        .await
        .unwrap();
    assert_eq!(provisioned.driver_path, jar);
    assert!(
        provisioned
            .descriptor
            .ds_url()
            .unwrap()
            .starts_with("jdbc:h2:mem:")
    );
    assert!(ctx.release(&provisioned).await);
}

#[tokio::test]
async fn test_provision_fails_without_driver_jar() {
    let repo = TempDir::new().unwrap();
    let ctx = AllocatorContext::new(common::embedded_props());
    let err = ctx
        .provision(&LocalRepositoryResolver::new(repo.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DriverArtifact { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_container_descriptor_reaches_postgres_driver() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let artifact = tempfile::NamedTempFile::new().unwrap();
    let props = Properties::new()
        .with(keys::MODE, "container")
        .with(keys::HEARTBEAT_TIMEOUT, "200");
    let db = DescriptorSpec {
        ds_url: Some(format!("jdbc:postgresql://127.0.0.1:{}/test", port)),
        ds_user: Some("test".into()),
        ds_password: Some("test".into()),
        ds_driver_class_name: Some("org.postgresql.Driver".into()),
        heartbeat_statement: Some("SELECT 1".into()),
        ..Default::default()
    }
    .build();

    let ctx = AllocatorContext::new(props);
    let allocator = ctx.get_instance().unwrap();
    assert!(allocator.requires_heartbeat());

    // Nothing listens, so the driver keeps failing until the timeout
    let ready = ctx
        .verify_ready(&allocator, &db, artifact.path())
        .await
        .unwrap();
    assert!(!ready);
}
