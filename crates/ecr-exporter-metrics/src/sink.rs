//! Gauge sink written by the collectors.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

use crate::error::MetricsError;

/// Gauge name for the repository count.
pub const REPOSITORY_COUNT: &str = "aws_ecr_repository_count";
/// Gauge name for repository metadata.
pub const REPOSITORY_INFO: &str = "aws_ecr_repository_info";
/// Gauge name for image sizes.
pub const IMAGE_SIZE: &str = "aws_ecr_image_size_bytes";
/// Gauge name for image push timestamps.
pub const IMAGE_PUSHED_AT: &str = "aws_ecr_image_pushed_timestamp_seconds";
/// Gauge name for scan finding counts.
pub const SCAN_FINDINGS: &str = "aws_ecr_image_scan_findings";
/// Gauge name for scan completion timestamps.
pub const SCAN_COMPLETED_AT: &str = "aws_ecr_image_scan_completed_timestamp_seconds";

/// Labels of the repository info gauge.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryLabels<'a> {
    /// Repository name.
    pub name: &'a str,
    /// Registry id.
    pub registry: &'a str,
    /// Scan-on-push flag.
    pub scan_on_push: bool,
    /// Tag mutability policy.
    pub tag_mutability: &'a str,
    /// Repository URI.
    pub uri: &'a str,
}

/// Labels identifying one (digest, tag) image series.
#[derive(Debug, Clone, Copy)]
pub struct ImageLabels<'a> {
    /// Repository name.
    pub repository: &'a str,
    /// Image digest.
    pub digest: &'a str,
    /// Image tag.
    pub tag: &'a str,
}

/// Write surface for collected values.
///
/// Writes to distinct label sets are independent; repeated writes to the same
/// label set overwrite the previous value.
pub trait MetricSink: Send + Sync {
    /// Sets the number of repositories in the registry.
    fn set_repository_count(&self, count: usize);

    /// Marks a repository as present, carrying its metadata as labels.
    fn set_repository_info(&self, labels: &RepositoryLabels<'_>);

    /// Sets an image's size in bytes.
    fn set_image_size(&self, image: &ImageLabels<'_>, bytes: f64);

    /// Sets an image's push time in Unix seconds.
    fn set_image_pushed_at(&self, image: &ImageLabels<'_>, seconds: f64);

    /// Sets an image's scan completion time in Unix seconds.
    fn set_scan_completed_at(&self, image: &ImageLabels<'_>, seconds: f64);

    /// Sets the number of findings of one severity for an image.
    fn set_scan_findings(&self, image: &ImageLabels<'_>, severity: &str, count: f64);
}

/// [`MetricSink`] backed by a dedicated Prometheus registry.
#[derive(Clone)]
pub struct PrometheusSink {
    registry: Registry,
    repository_count: Gauge,
    repository_info: GaugeVec,
    image_size: GaugeVec,
    image_pushed_at: GaugeVec,
    scan_findings: GaugeVec,
    scan_completed_at: GaugeVec,
}

impl PrometheusSink {
    /// Creates the sink and registers every gauge.
    ///
    /// # Errors
    ///
    /// Returns an error if a gauge cannot be created or registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let repository_count = Gauge::with_opts(Opts::new(
            REPOSITORY_COUNT,
            "The total number of repositories in the AWS ECR registry.",
        ))?;
        let repository_info = GaugeVec::new(
            Opts::new(
                REPOSITORY_INFO,
                "Informational metric providing context via labels.",
            ),
            &["name", "registry", "scan_on_push", "tag_mutability", "uri"],
        )?;
        let image_size = GaugeVec::new(
            Opts::new(IMAGE_SIZE, "The size of the AWS ECR image in bytes."),
            &["repository", "tag", "digest"],
        )?;
        let image_pushed_at = GaugeVec::new(
            Opts::new(
                IMAGE_PUSHED_AT,
                "The timestamp at which the image was pushed to AWS ECR.",
            ),
            &["repository", "tag", "digest"],
        )?;
        let scan_findings = GaugeVec::new(
            Opts::new(SCAN_FINDINGS, "The number of findings for an AWS ECR image scan."),
            &["repository", "digest", "tag", "severity"],
        )?;
        let scan_completed_at = GaugeVec::new(
            Opts::new(
                SCAN_COMPLETED_AT,
                "The timestamp of the latest completed image scan in AWS ECR.",
            ),
            &["repository", "digest", "tag"],
        )?;

        registry.register(Box::new(repository_count.clone()))?;
        registry.register(Box::new(repository_info.clone()))?;
        registry.register(Box::new(image_size.clone()))?;
        registry.register(Box::new(image_pushed_at.clone()))?;
        registry.register(Box::new(scan_findings.clone()))?;
        registry.register(Box::new(scan_completed_at.clone()))?;

        Ok(Self {
            registry,
            repository_count,
            repository_info,
            image_size,
            image_pushed_at,
            scan_findings,
            scan_completed_at,
        })
    }

    /// Returns the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders every gauge in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encode {
                message: e.to_string(),
            })?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode {
            message: e.to_string(),
        })
    }

    /// Looks up the current value of the series with exactly these labels.
    ///
    /// Returns `None` if the series has never been written.
    #[must_use]
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .find(|metric| {
                let pairs = metric.get_label();
                pairs.len() == labels.len()
                    && labels.iter().all(|(k, v)| {
                        pairs
                            .iter()
                            .any(|pair| pair.get_name() == *k && pair.get_value() == *v)
                    })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Counts the series currently present under a gauge name.
    #[must_use]
    pub fn series_count(&self, name: &str) -> usize {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .map(|family| family.get_metric().len())
            .sum()
    }
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink").finish_non_exhaustive()
    }
}

impl MetricSink for PrometheusSink {
    #[allow(clippy::cast_precision_loss)]
    fn set_repository_count(&self, count: usize) {
        self.repository_count.set(count as f64);
    }

    fn set_repository_info(&self, labels: &RepositoryLabels<'_>) {
        let scan_on_push = if labels.scan_on_push { "true" } else { "false" };
        self.repository_info
            .with_label_values(&[
                labels.name,
                labels.registry,
                scan_on_push,
                labels.tag_mutability,
                labels.uri,
            ])
            .set(1.0);
    }

    fn set_image_size(&self, image: &ImageLabels<'_>, bytes: f64) {
        self.image_size
            .with_label_values(&[image.repository, image.tag, image.digest])
            .set(bytes);
    }

    fn set_image_pushed_at(&self, image: &ImageLabels<'_>, seconds: f64) {
        self.image_pushed_at
            .with_label_values(&[image.repository, image.tag, image.digest])
            .set(seconds);
    }

    fn set_scan_completed_at(&self, image: &ImageLabels<'_>, seconds: f64) {
        self.scan_completed_at
            .with_label_values(&[image.repository, image.digest, image.tag])
            .set(seconds);
    }

    fn set_scan_findings(&self, image: &ImageLabels<'_>, severity: &str, count: f64) {
        self.scan_findings
            .with_label_values(&[image.repository, image.digest, image.tag, severity])
            .set(count);
    }
}
