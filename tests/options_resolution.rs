//! End-to-end options resolution scenarios for OptWatch

use optwatch::{
    ConfigurationSource, FileSource, MemorySource, OptionsMonitor, OptionsPipeline,
    ValidationOutcome,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct MetricsOptions {
    application_version: String,
    host_name: String,
}

/// Assemble the metrics pipeline against any source.
fn metrics_pipeline(source: Arc<dyn ConfigurationSource>) -> OptionsPipeline<MetricsOptions> {
    OptionsPipeline::new()
        .configure(move |options: &mut MetricsOptions| {
            options.application_version = source.get("ApplicationVersion").unwrap_or_default();
            options.host_name = source.get("Metrics.HostName").unwrap_or_default();
        })
        .validate(|_, options: &MetricsOptions| {
            if options.application_version == "1.1" {
                return ValidationOutcome::failure("Application version 1.1 is not allowed");
            }
            if options.host_name == "10.10.10.11" {
                return ValidationOutcome::failure("HostName 10.10.10.11 is not allowed");
            }
            ValidationOutcome::Success
        })
}

#[test]
fn test_initial_resolution_serves_configured_values() {
    let source = Arc::new(MemorySource::with_entries([
        ("ApplicationVersion", "2.0"),
        ("Metrics.HostName", "host-a"),
    ]));

    let monitor = OptionsMonitor::new(source.clone(), metrics_pipeline(source.clone()))
        .expect("startup resolution failed");

    let current = monitor.current();
    assert_eq!(current.application_version, "2.0");
    assert_eq!(current.host_name, "host-a");
}

#[test]
fn test_rejected_update_serves_stale_value_and_stays_quiet() {
    let source = Arc::new(MemorySource::with_entries([
        ("ApplicationVersion", "2.0"),
        ("Metrics.HostName", "host-a"),
    ]));
    let monitor = OptionsMonitor::new(source.clone(), metrics_pipeline(source.clone()))
        .expect("startup resolution failed");

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let _subscription = monitor.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    source.set("ApplicationVersion", "1.1");

    let current = monitor.current();
    assert_eq!(current.application_version, "2.0");
    assert_eq!(current.host_name, "host-a");
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    let reason = monitor
        .stats()
        .last_failure_reason
        .expect("failed cycle should record its reason");
    assert!(reason.contains("Application version 1.1 is not allowed"));
}

#[test]
fn test_accepted_update_notifies_every_subscriber_once() {
    let source = Arc::new(MemorySource::with_entries([
        ("ApplicationVersion", "2.0"),
        ("Metrics.HostName", "host-a"),
    ]));
    let monitor = OptionsMonitor::new(source.clone(), metrics_pipeline(source.clone()))
        .expect("startup resolution failed");

    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let counter = Arc::clone(&first_calls);
    let values = Arc::clone(&seen);
    let _first = monitor.on_change(move |options: &MetricsOptions| {
        counter.fetch_add(1, Ordering::SeqCst);
        values.lock().push(options.host_name.clone());
    });
    let counter = Arc::clone(&second_calls);
    let _second = monitor.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    source.set("Metrics.HostName", "host-b");

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.lock().as_slice(), ["host-b"]);

    let current = monitor.current();
    assert_eq!(current.application_version, "2.0");
    assert_eq!(current.host_name, "host-b");
}

#[test]
fn test_post_configure_only_touches_validated_values() {
    let source = Arc::new(MemorySource::with_entries([
        ("ApplicationVersion", "2.0"),
        ("Metrics.HostName", "HOST-A"),
    ]));

    let pipeline = metrics_pipeline(source.clone()).post_configure(
        |_, options: &mut MetricsOptions| {
            options.host_name = options.host_name.to_lowercase();
        },
    );
    let monitor =
        OptionsMonitor::new(source.clone(), pipeline).expect("startup resolution failed");
    assert_eq!(monitor.current().host_name, "host-a");

    // The rejected update never reaches PostConfigure; the published value
    // is still the normalized old one.
    source.set("ApplicationVersion", "1.1");
    assert_eq!(monitor.current().host_name, "host-a");
    assert_eq!(monitor.current().application_version, "2.0");
}

#[test]
fn test_burst_of_changes_settles_on_last_state() {
    let source = Arc::new(MemorySource::with_entries([
        ("ApplicationVersion", "2.0"),
        ("Metrics.HostName", "host-0"),
    ]));
    let monitor = OptionsMonitor::new(source.clone(), metrics_pipeline(source.clone()))
        .expect("startup resolution failed");

    for i in 1..=20 {
        source.set("Metrics.HostName", format!("host-{i}"));
    }

    assert_eq!(monitor.current().host_name, "host-20");
}

#[test]
fn test_one_source_feeds_multiple_monitors() {
    #[derive(Debug, Default)]
    struct BannerOptions {
        banner: String,
    }

    let source = Arc::new(MemorySource::with_entries([
        ("ApplicationVersion", "2.0"),
        ("Metrics.HostName", "host-a"),
    ]));

    let metrics = OptionsMonitor::new(source.clone(), metrics_pipeline(source.clone()))
        .expect("startup resolution failed");

    let reader: Arc<dyn ConfigurationSource> = source.clone();
    let banner_pipeline = OptionsPipeline::new().configure(move |options: &mut BannerOptions| {
        options.banner = format!(
            "v{} @ {}",
            reader.get("ApplicationVersion").unwrap_or_default(),
            reader.get("Metrics.HostName").unwrap_or_default()
        );
    });
    let banner =
        OptionsMonitor::new(source.clone(), banner_pipeline).expect("startup resolution failed");
    assert_eq!(banner.current().banner, "v2.0 @ host-a");

    // One mutation drives a cycle on each monitor independently.
    source.set("Metrics.HostName", "host-b");
    assert_eq!(metrics.current().host_name, "host-b");
    assert_eq!(banner.current().banner, "v2.0 @ host-b");
}

#[test]
fn test_file_backed_monitor_follows_refresh() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("appsettings.json");
    std::fs::write(
        &path,
        r#"{"ApplicationVersion": "2.0", "Metrics": {"HostName": "host-a"}}"#,
    )
    .expect("Failed to write config file");

    let source = Arc::new(FileSource::open(&path).expect("Failed to open source"));
    let monitor = OptionsMonitor::new(source.clone(), metrics_pipeline(source.clone()))
        .expect("startup resolution failed");
    assert_eq!(monitor.current().host_name, "host-a");

    // Accepted rewrite.
    std::fs::write(
        &path,
        r#"{"ApplicationVersion": "2.0", "Metrics": {"HostName": "host-b"}}"#,
    )
    .expect("Failed to rewrite config file");
    source.refresh().expect("Refresh failed");
    assert_eq!(monitor.current().host_name, "host-b");

    // Rejected rewrite keeps serving the previous value.
    std::fs::write(
        &path,
        r#"{"ApplicationVersion": "1.1", "Metrics": {"HostName": "host-c"}}"#,
    )
    .expect("Failed to rewrite config file");
    assert!(source.refresh().expect("Refresh failed"));
    assert_eq!(monitor.current().host_name, "host-b");
    assert_eq!(monitor.current().application_version, "2.0");
}
