//! End-to-end tests for the collection pipeline against an in-memory registry.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use ecr_exporter_collector::{CollectorConfig, CollectorError, CronScheduler, RepositoryCollector};
use ecr_exporter_metrics::{
    ImageLabels, MetricSink, PrometheusSink, RepositoryLabels, IMAGE_PUSHED_AT, IMAGE_SIZE,
    REPOSITORY_COUNT, REPOSITORY_INFO, SCAN_COMPLETED_AT, SCAN_FINDINGS,
};
use ecr_exporter_registry::{
    ImageDescriptor, ImageId, Page, RegistryApi, RegistryConnector, RegistryError, Repository,
    ScanFindings, Severity,
};

// =============================================================================
// Fixtures
// =============================================================================

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

fn repository(name: &str) -> Repository {
    Repository {
        name: name.to_string(),
        registry_id: "123456789012".to_string(),
        uri: format!("123456789012.dkr.ecr.eu-west-1.amazonaws.com/{name}"),
        scan_on_push: name == "web",
        tag_mutability: "MUTABLE".to_string(),
    }
}

fn descriptor(digest: &str, tags: &[&str], size_bytes: i64, pushed_at: i64) -> ImageDescriptor {
    ImageDescriptor {
        digest: digest.to_string(),
        tags: tags.iter().map(ToString::to_string).collect(),
        size_bytes,
        pushed_at: Some(at(pushed_at)),
    }
}

fn findings(completed_at: Option<i64>, counts: &[(Severity, i64)]) -> ScanFindings {
    ScanFindings {
        completed_at: completed_at.map(at),
        severity_counts: counts.iter().copied().collect(),
    }
}

/// Serves `pages[n]` for cursor `n`, linking pages with numeric tokens.
fn paged<T: Clone>(pages: &[T], token: Option<String>) -> Page<T> {
    let index = token.map_or(0, |t| t.parse::<usize>().unwrap());
    let items = pages[index].clone();
    if index + 1 < pages.len() {
        Page::with_next(items, (index + 1).to_string())
    } else {
        Page::last(items)
    }
}

/// In-memory registry with per-call bookkeeping.
#[derive(Default)]
struct FakeRegistry {
    repository_pages: Vec<Vec<Repository>>,
    image_pages: HashMap<String, Vec<Vec<ImageId>>>,
    descriptors: HashMap<String, Vec<ImageDescriptor>>,
    findings: HashMap<String, ScanFindings>,
    failing_repository_page: Option<usize>,
    failing_listings: HashSet<String>,
    missing_images: HashSet<String>,
    unscanned: HashSet<String>,
    failing_findings: HashSet<String>,
    findings_calls: Mutex<HashMap<String, usize>>,
    requests: AtomicUsize,
}

impl FakeRegistry {
    /// Three repositories over two pages: an empty one, one with two images
    /// of two tags each, and one whose only image has no scan yet.
    fn fixture() -> Self {
        let mut registry = Self {
            repository_pages: vec![
                vec![repository("empty"), repository("web")],
                vec![repository("api")],
            ],
            ..Self::default()
        };

        registry
            .image_pages
            .insert("empty".to_string(), vec![Vec::new()]);
        registry.image_pages.insert(
            "web".to_string(),
            vec![
                vec![
                    ImageId::new("sha256:d2", "v1"),
                    ImageId::new("sha256:d2", "stable"),
                ],
                vec![
                    ImageId::new("sha256:d1", "v2"),
                    ImageId::new("sha256:d1", "latest"),
                ],
            ],
        );
        registry.image_pages.insert(
            "api".to_string(),
            vec![vec![ImageId::new("sha256:d3", "main")]],
        );

        registry.descriptors.insert(
            "web".to_string(),
            vec![
                descriptor("sha256:d1", &["v2", "latest"], 2048, 2_000),
                descriptor("sha256:d2", &["v1", "stable"], 1024, 1_000),
            ],
        );
        registry.descriptors.insert(
            "api".to_string(),
            vec![descriptor("sha256:d3", &["main"], 512, 1_500)],
        );

        registry.findings.insert(
            "sha256:d1".to_string(),
            findings(
                Some(3_000),
                &[(Severity::Critical, 2), (Severity::High, 1)],
            ),
        );
        registry
            .findings
            .insert("sha256:d2".to_string(), findings(None, &[(Severity::Medium, 4)]));

        registry
    }

    fn findings_calls(&self, digest: &str) -> usize {
        self.findings_calls.lock().get(digest).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn describe_repositories(
        &self,
        next_token: Option<String>,
    ) -> Result<Page<Vec<Repository>>, RegistryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let page = paged(&self.repository_pages, next_token.clone());
        let index = next_token.map_or(0, |t| t.parse::<usize>().unwrap());
        if self.failing_repository_page == Some(index) {
            return Err(RegistryError::api("DescribeRepositories", "throttled"));
        }
        Ok(page)
    }

    async fn list_images(
        &self,
        repository: &Repository,
        next_token: Option<String>,
    ) -> Result<Page<Vec<ImageId>>, RegistryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing_listings.contains(&repository.name) {
            return Err(RegistryError::api("ListImages", "access denied"));
        }
        let pages = self.image_pages.get(&repository.name).ok_or_else(|| {
            RegistryError::RepositoryNotFound {
                repository: repository.name.clone(),
            }
        })?;
        Ok(paged(pages, next_token))
    }

    async fn describe_images(
        &self,
        repository: &Repository,
        image_ids: &[ImageId],
        _next_token: Option<String>,
    ) -> Result<Page<Vec<ImageDescriptor>>, RegistryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let wanted: HashSet<_> = image_ids.iter().filter_map(|id| id.digest.clone()).collect();
        if wanted.iter().any(|digest| self.missing_images.contains(digest)) {
            return Err(RegistryError::ImageNotFound {
                repository: repository.name.clone(),
            });
        }
        let described = self
            .descriptors
            .get(&repository.name)
            .map(|all| {
                all.iter()
                    .filter(|d| wanted.contains(&d.digest))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Page::last(described))
    }

    async fn describe_image_scan_findings(
        &self,
        repository: &Repository,
        digest: &str,
        _tag: &str,
        _next_token: Option<String>,
    ) -> Result<Page<Option<ScanFindings>>, RegistryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self
            .findings_calls
            .lock()
            .entry(digest.to_string())
            .or_default() += 1;

        if self.unscanned.contains(digest) {
            return Ok(Page::last(None));
        }
        if self.failing_findings.contains(digest) {
            return Err(RegistryError::api("DescribeImageScanFindings", "throttled"));
        }
        self.findings
            .get(digest)
            .map(|f| Page::last(Some(f.clone())))
            .ok_or_else(|| RegistryError::ScanNotFound {
                repository: repository.name.clone(),
                digest: digest.to_string(),
            })
    }
}

struct FakeConnector {
    registry: Arc<FakeRegistry>,
    fail: AtomicBool,
    connects: AtomicUsize,
}

impl FakeConnector {
    fn new(registry: FakeRegistry) -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(registry),
            fail: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RegistryConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn RegistryApi>, RegistryError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RegistryError::ConfigLoad {
                message: "no credentials".to_string(),
            });
        }
        Ok(Arc::clone(&self.registry) as Arc<dyn RegistryApi>)
    }
}

/// Prometheus sink that also records the order of image size writes.
struct RecordingSink {
    inner: PrometheusSink,
    sized: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: PrometheusSink::new().unwrap(),
            sized: Mutex::new(Vec::new()),
        })
    }

    fn sized_tags(&self, repository: &str) -> Vec<String> {
        self.sized
            .lock()
            .iter()
            .filter(|(r, _)| r == repository)
            .map(|(_, tag)| tag.clone())
            .collect()
    }
}

impl MetricSink for RecordingSink {
    fn set_repository_count(&self, count: usize) {
        self.inner.set_repository_count(count);
    }

    fn set_repository_info(&self, labels: &RepositoryLabels<'_>) {
        self.inner.set_repository_info(labels);
    }

    fn set_image_size(&self, image: &ImageLabels<'_>, bytes: f64) {
        self.sized
            .lock()
            .push((image.repository.to_string(), image.tag.to_string()));
        self.inner.set_image_size(image, bytes);
    }

    fn set_image_pushed_at(&self, image: &ImageLabels<'_>, seconds: f64) {
        self.inner.set_image_pushed_at(image, seconds);
    }

    fn set_scan_completed_at(&self, image: &ImageLabels<'_>, seconds: f64) {
        self.inner.set_scan_completed_at(image, seconds);
    }

    fn set_scan_findings(&self, image: &ImageLabels<'_>, severity: &str, count: f64) {
        self.inner.set_scan_findings(image, severity, count);
    }
}

fn fast_config() -> CollectorConfig {
    CollectorConfig::builder()
        .rate_limit_frequency(1000.0)
        .rate_limit_burst(100)
        .build()
}

fn collector(
    config: CollectorConfig,
    connector: &Arc<FakeConnector>,
    sink: &Arc<RecordingSink>,
) -> RepositoryCollector {
    RepositoryCollector::new(
        config,
        Arc::clone(connector) as Arc<dyn RegistryConnector>,
        Arc::clone(sink) as Arc<dyn MetricSink>,
    )
    .unwrap()
}

fn image_size(sink: &RecordingSink, repository: &str, digest: &str, tag: &str) -> Option<f64> {
    sink.inner.value(
        IMAGE_SIZE,
        &[("repository", repository), ("tag", tag), ("digest", digest)],
    )
}

fn scan_findings(
    sink: &RecordingSink,
    digest: &str,
    tag: &str,
    severity: &str,
) -> Option<f64> {
    sink.inner.value(
        SCAN_FINDINGS,
        &[
            ("repository", "web"),
            ("digest", digest),
            ("tag", tag),
            ("severity", severity),
        ],
    )
}

// =============================================================================
// Full Cycle Tests
// =============================================================================

#[tokio::test]
async fn test_full_cycle_emits_expected_series() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    let summary = collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(summary.repositories, 3);
    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));
    assert_eq!(sink.inner.series_count(REPOSITORY_INFO), 3);
    assert_eq!(
        sink.inner.value(
            REPOSITORY_INFO,
            &[
                ("name", "web"),
                ("registry", "123456789012"),
                ("scan_on_push", "true"),
                ("tag_mutability", "MUTABLE"),
                ("uri", "123456789012.dkr.ecr.eu-west-1.amazonaws.com/web"),
            ],
        ),
        Some(1.0)
    );

    // Four web pairs plus the single api pair; nothing for the empty repository.
    assert_eq!(sink.inner.series_count(IMAGE_SIZE), 5);
    assert_eq!(sink.inner.series_count(IMAGE_PUSHED_AT), 5);
    assert_eq!(image_size(&sink, "web", "sha256:d1", "latest"), Some(2048.0));
    assert_eq!(image_size(&sink, "web", "sha256:d2", "stable"), Some(1024.0));
    assert_eq!(image_size(&sink, "api", "sha256:d3", "main"), Some(512.0));
    assert_eq!(
        sink.inner.value(
            IMAGE_PUSHED_AT,
            &[("repository", "web"), ("tag", "v2"), ("digest", "sha256:d1")],
        ),
        Some(2_000.0)
    );

    // Findings for every web pair, none for the unscanned api image.
    assert_eq!(sink.inner.series_count(SCAN_FINDINGS), 4 * Severity::ALL.len());
    assert_eq!(scan_findings(&sink, "sha256:d1", "v2", "critical"), Some(2.0));
    assert_eq!(scan_findings(&sink, "sha256:d1", "latest", "high"), Some(1.0));

    // Only d1 carries a completion time.
    assert_eq!(sink.inner.series_count(SCAN_COMPLETED_AT), 2);
    assert_eq!(
        sink.inner.value(
            SCAN_COMPLETED_AT,
            &[("repository", "web"), ("digest", "sha256:d1"), ("tag", "v2")],
        ),
        Some(3_000.0)
    );

    assert_eq!(connector.registry.findings_calls("sha256:d3"), 1);
}

#[tokio::test]
async fn test_missing_severities_are_zero_filled() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    for tag in ["v1", "stable"] {
        assert_eq!(scan_findings(&sink, "sha256:d2", tag, "medium"), Some(4.0));
        for severity in ["critical", "high", "low", "informational"] {
            assert_eq!(
                scan_findings(&sink, "sha256:d2", tag, severity),
                Some(0.0),
                "{tag}/{severity}"
            );
        }
    }
}

#[tokio::test]
async fn test_second_cycle_skips_cached_findings() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);
    let cancel = CancellationToken::new();

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    let registry = &connector.registry;
    let d1_calls = registry.findings_calls("sha256:d1");
    let d2_calls = registry.findings_calls("sha256:d2");
    let d3_calls = registry.findings_calls("sha256:d3");
    let before = sink.inner.encode_text().unwrap();

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(registry.findings_calls("sha256:d1"), d1_calls);
    assert_eq!(registry.findings_calls("sha256:d2"), d2_calls);
    // A missing scan is never cached, so it is asked for again.
    assert_eq!(registry.findings_calls("sha256:d3"), d3_calls + 1);
    assert_eq!(sink.inner.encode_text().unwrap(), before);
}

// =============================================================================
// Tag Budget Tests
// =============================================================================

#[tokio::test]
async fn test_tag_budget_caps_each_repository() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let config = CollectorConfig::builder()
        .rate_limit_frequency(1000.0)
        .rate_limit_burst(100)
        .tag_limit(3)
        .build();
    let collector = collector(config, &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    // Three of four web pairs, and the single api pair.
    assert_eq!(sink.inner.series_count(IMAGE_SIZE), 4);
    assert_eq!(image_size(&sink, "web", "sha256:d2", "stable"), None);
    assert_eq!(scan_findings(&sink, "sha256:d2", "stable", "medium"), None);
    assert_eq!(image_size(&sink, "api", "sha256:d3", "main"), Some(512.0));
}

#[tokio::test]
async fn test_zero_tag_budget_emits_no_image_series() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let config = CollectorConfig::builder()
        .rate_limit_frequency(1000.0)
        .rate_limit_burst(100)
        .tag_limit(0)
        .build();
    let collector = collector(config, &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));
    assert_eq!(sink.inner.series_count(IMAGE_SIZE), 0);
    assert_eq!(sink.inner.series_count(SCAN_FINDINGS), 0);
}

#[tokio::test]
async fn test_images_emitted_newest_first() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    // d2 is listed first upstream but d1 was pushed later.
    assert_eq!(sink.sized_tags("web"), vec!["v2", "latest", "v1", "stable"]);
}

// =============================================================================
// Failure Handling Tests
// =============================================================================

#[tokio::test]
async fn test_connect_failure_keeps_previous_count() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);
    let cancel = CancellationToken::new();

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    connector.fail.store(true, Ordering::SeqCst);
    let requests = connector.registry.requests.load(Ordering::SeqCst);

    let err = collector.collect(&cancel).await.unwrap_err();
    assert!(matches!(
        err,
        CollectorError::Registry(RegistryError::ConfigLoad { .. })
    ));
    assert_eq!(connector.registry.requests.load(Ordering::SeqCst), requests);
    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));

    // The scheduler entry point swallows the failure.
    collector.run_cycle(&cancel).await;
    assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_repository_page_failure_aborts_cycle() {
    let registry = FakeRegistry {
        failing_repository_page: Some(1),
        ..FakeRegistry::fixture()
    };
    let connector = FakeConnector::new(registry);
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    let err = collector.collect(&CancellationToken::new()).await.unwrap_err();
    collector.wait_for_tasks().await;

    assert!(matches!(err, CollectorError::Registry(RegistryError::Api { .. })));
    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(0.0));
    // Repositories on the first page were already dispatched.
    assert_eq!(sink.inner.series_count(REPOSITORY_INFO), 2);
    assert_eq!(image_size(&sink, "web", "sha256:d1", "v2"), Some(2048.0));
}

#[tokio::test]
async fn test_listing_failure_is_isolated_to_its_repository() {
    let mut registry = FakeRegistry::fixture();
    registry.failing_listings.insert("web".to_string());
    let connector = FakeConnector::new(registry);
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));
    assert!(sink.sized_tags("web").is_empty());
    assert_eq!(image_size(&sink, "api", "sha256:d3", "main"), Some(512.0));
}

#[tokio::test]
async fn test_vanished_repository_is_skipped() {
    let mut registry = FakeRegistry::fixture();
    registry.image_pages.remove("api");
    let connector = FakeConnector::new(registry);
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));
    assert!(sink.sized_tags("api").is_empty());
    assert_eq!(sink.sized_tags("web").len(), 4);
}

#[tokio::test]
async fn test_image_deleted_during_describe_skips_only_its_page() {
    let mut registry = FakeRegistry::fixture();
    registry.missing_images.insert("sha256:d2".to_string());
    let connector = FakeConnector::new(registry);
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);

    collector.collect(&CancellationToken::new()).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));
    assert_eq!(sink.sized_tags("web"), vec!["v2", "latest"]);
    assert_eq!(image_size(&sink, "web", "sha256:d2", "v1"), None);
    assert_eq!(scan_findings(&sink, "sha256:d1", "v2", "critical"), Some(2.0));
    assert_eq!(image_size(&sink, "api", "sha256:d3", "main"), Some(512.0));
}

#[tokio::test]
async fn test_findings_without_payload_are_cached() {
    let mut registry = FakeRegistry::fixture();
    registry.unscanned.insert("sha256:d2".to_string());
    let connector = FakeConnector::new(registry);
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);
    let cancel = CancellationToken::new();

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    let d2_calls = connector.registry.findings_calls("sha256:d2");
    assert!(d2_calls >= 1);
    assert_eq!(scan_findings(&sink, "sha256:d2", "v1", "medium"), None);
    assert_eq!(image_size(&sink, "web", "sha256:d2", "v1"), Some(1024.0));

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(connector.registry.findings_calls("sha256:d2"), d2_calls);
    assert_eq!(scan_findings(&sink, "sha256:d2", "stable", "medium"), None);
}

#[tokio::test]
async fn test_findings_failure_is_not_cached() {
    let mut registry = FakeRegistry::fixture();
    registry.failing_findings.insert("sha256:d1".to_string());
    registry.findings.remove("sha256:d2");
    let connector = FakeConnector::new(registry);
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);
    let cancel = CancellationToken::new();

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    // One request per tag, and no series for the failed digest.
    assert_eq!(connector.registry.findings_calls("sha256:d1"), 2);
    assert_eq!(sink.inner.series_count(SCAN_FINDINGS), 0);
    assert_eq!(sink.inner.series_count(SCAN_COMPLETED_AT), 0);
    assert_eq!(image_size(&sink, "web", "sha256:d1", "v2"), Some(2048.0));

    collector.collect(&cancel).await.unwrap();
    collector.wait_for_tasks().await;

    assert_eq!(connector.registry.findings_calls("sha256:d1"), 4);
    assert_eq!(sink.inner.series_count(SCAN_FINDINGS), 0);
}

// =============================================================================
// Cancellation and Scheduling Tests
// =============================================================================

#[tokio::test]
async fn test_cancelled_before_start_issues_no_requests() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = collector.collect(&cancel).await.unwrap_err();
    collector.wait_for_tasks().await;

    assert!(matches!(err, CollectorError::RateLimit(_)));
    assert_eq!(connector.registry.requests.load(Ordering::SeqCst), 0);
    assert_eq!(sink.inner.series_count(REPOSITORY_INFO), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_rate_limited_cycle() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let config = CollectorConfig::builder()
        .rate_limit_frequency(0.5)
        .rate_limit_burst(1)
        .build();
    let collector = collector(config, &connector, &sink);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = collector.collect(&cancel).await.unwrap_err();
    collector.wait_for_tasks().await;

    assert!(matches!(err, CollectorError::RateLimit(_)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(0.0));
    assert_eq!(connector.registry.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_fires_cycles_until_cancelled() {
    let connector = FakeConnector::new(FakeRegistry::fixture());
    let sink = RecordingSink::new();
    let collector = collector(fast_config(), &connector, &sink);
    let scheduler = CronScheduler::new("* * * * * *").unwrap();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    scheduler.run(&collector, &cancel).await;
    collector.wait_for_tasks().await;

    assert!(connector.connects.load(Ordering::SeqCst) >= 1);
    assert_eq!(sink.inner.value(REPOSITORY_COUNT, &[]), Some(3.0));
}
